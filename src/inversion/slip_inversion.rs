use super::{predict, NnlsSolver, Observations, ProgressFn, Regularizer, SystemMatrixBuilder};
use crate::base::{Config, InversionError};
use crate::geometry::{cardinal_components, FaultModel};
use crate::kernel::OkadaKernel;
use russell_lab::{vec_norm, Matrix, Norm, Vector};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Holds the outcome of an inversion
#[derive(Clone, Debug)]
pub struct InversionResults {
    /// The discretized fault
    pub model: FaultModel,

    /// Slip coefficients (≥ 0), one per (patch, basis direction), patch-major
    pub slip: Vector,

    /// Predicted displacement (east, north, up) at each observation point
    pub predicted: Vec<[f64; 3]>,

    /// Root-mean-square of the data residual
    pub rms: f64,

    /// Sum of squared residuals divided by the variances (rows with σ = 0 are skipped)
    pub chi2: f64,

    /// Euclidean norm of the slip vector
    pub slip_norm: f64,

    /// Whether the rows of G and d were weighted by 1/σ
    pub weighted: bool,
}

impl InversionResults {
    /// Returns the slip coefficients of patch `p`
    pub fn slip_of(&self, p: usize) -> &[f64] {
        let nd = self.model.n_direction();
        &self.slip.as_data()[p * nd..(p + 1) * nd]
    }

    /// Returns the slip of every patch in the patch frame (along-strike, up-dip, normal)
    pub fn cardinal_slip(&self) -> Result<Vec<[f64; 3]>, InversionError> {
        (0..self.model.n_patch())
            .map(|p| cardinal_components(self.slip_of(p), self.model.basis(p)))
            .collect()
    }
}

/// Runs the complete inversion described by a configuration
///
/// The steps are:
///
/// 1. discretize the fault segments
/// 2. assemble G for the east, north, and up components of every observation
/// 3. optionally weight the rows of G and d by 1/σ
/// 4. build the penalty operator L
/// 5. solve `[G; L] x = [d; 0]` with `x ≥ 0`
/// 6. compute the predicted displacements `G x` and the fit statistics
pub struct SlipInversion<'a> {
    config: &'a Config,
    kernel: OkadaKernel,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ProgressFn>,
}

impl<'a> SlipInversion<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config) -> Result<Self, InversionError> {
        if let Some(msg) = config.validate() {
            return Err(InversionError::InvalidConfig(msg));
        }
        Ok(SlipInversion {
            config,
            kernel: OkadaKernel::new(config.poisson)?,
            cancel: None,
            progress: None,
        })
    }

    /// Sets a flag that cancels the matrix assembly once raised
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) -> &mut Self {
        self.cancel = Some(flag);
        self
    }

    /// Sets a callback invoked after each assembled column of G
    pub fn set_progress(&mut self, callback: ProgressFn) -> &mut Self {
        self.progress = Some(callback);
        self
    }

    /// Returns the kernel used by the inversion
    pub fn kernel(&self) -> &OkadaKernel {
        &self.kernel
    }

    /// Runs the inversion on the fault model described by the configuration
    pub fn run(&self, observations: &Observations) -> Result<InversionResults, InversionError> {
        let model = FaultModel::from_config(self.config)?;
        self.run_with_model(model, observations)
    }

    /// Runs the inversion on a given fault model (e.g., with per-patch slip bases)
    pub fn run_with_model(
        &self,
        model: FaultModel,
        observations: &Observations,
    ) -> Result<InversionResults, InversionError> {
        if observations.is_empty() {
            return Err(InversionError::DimensionMismatch("there are no observations".to_string()));
        }
        tracing::info!(
            n_point = observations.len(),
            n_patch = model.n_patch(),
            n_unknown = model.n_unknown(),
            "running slip inversion"
        );

        // forward operator
        let flat = observations.flatten();
        let mut builder = SystemMatrixBuilder::new(&self.kernel);
        if let Some(flag) = &self.cancel {
            builder.set_cancel_flag(flag.clone());
        }
        if let Some(callback) = &self.progress {
            builder.set_progress(callback.clone());
        }
        let gg = builder.build(&flat.positions, &flat.directions, &model)?;

        // penalty and solution
        let ll = Regularizer::new(self.config.regularization, self.config.damping)?.build(&model)?;
        let solver = NnlsSolver::from_config(self.config)?;
        let slip = if self.config.weighted {
            let (gw, dw) = weight_system(&gg, &flat.values, &flat.sigmas)?;
            solver.solve(&gw, &ll, &dw)?
        } else {
            solver.solve(&gg, &ll, &flat.values)?
        };

        // fit
        let predicted = predict(&gg, &slip)?;
        let (rms, chi2) = fit_statistics(&flat.values, &predicted, &flat.sigmas);
        let slip_norm = vec_norm(&slip, Norm::Euc);
        tracing::info!(rms, chi2, slip_norm, "slip inversion finished");
        Ok(InversionResults {
            model,
            slip,
            predicted: Observations::unflatten(&predicted)?,
            rms,
            chi2,
            slip_norm,
            weighted: self.config.weighted,
        })
    }
}

/// Divides each row of G and d by the standard deviation of the row
///
/// Returns `(G_w, d_w)`. All standard deviations must be > 0.
pub fn weight_system(gg: &Matrix, d: &Vector, sigmas: &Vector) -> Result<(Matrix, Vector), InversionError> {
    let (nrow, ncol) = gg.dims();
    if d.dim() != nrow || sigmas.dim() != nrow {
        return Err(InversionError::DimensionMismatch(format!(
            "G has {} rows, the data vector has {} values, and there are {} sigmas",
            nrow,
            d.dim(),
            sigmas.dim()
        )));
    }
    if sigmas.as_data().iter().any(|s| !(*s > 0.0)) {
        return Err(InversionError::InvalidInput(
            "standard deviations must be > 0.0 in a weighted inversion",
        ));
    }
    let mut gw = Matrix::new(nrow, ncol);
    let mut dw = Vector::new(nrow);
    for i in 0..nrow {
        dw[i] = d[i] / sigmas[i];
        for j in 0..ncol {
            gw.set(i, j, gg.get(i, j) / sigmas[i]);
        }
    }
    Ok((gw, dw))
}

/// Returns the root-mean-square residual and the chi-square of the fit
fn fit_statistics(observed: &Vector, predicted: &Vector, sigmas: &Vector) -> (f64, f64) {
    let n = observed.dim();
    let mut sum_sq = 0.0;
    let mut chi2 = 0.0;
    for i in 0..n {
        let r = observed[i] - predicted[i];
        sum_sq += r * r;
        if sigmas[i] > 0.0 {
            chi2 += r * r / (sigmas[i] * sigmas[i]);
        }
    }
    let rms = if n > 0 { f64::sqrt(sum_sq / (n as f64)) } else { 0.0 };
    (rms, chi2)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
