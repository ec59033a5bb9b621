use super::Observations;
use crate::base::InversionError;
use crate::geometry::{dot, FaultModel};
use crate::kernel::GreenKernel;
use rayon::prelude::*;
use russell_lab::{mat_vec_mul, Matrix, Vector};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Defines a callback receiving `(finished_columns, total_columns)`
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Assembles the forward operator G relating slip to surface displacement
///
/// `G[row, col] = dot(kernel(patch, slip_direction, position[row]), direction[row])` where
/// `col` identifies a (patch, slip direction) pair of the fault model. Columns are independent
/// and are computed in parallel, each one written once into its own slice of the matrix.
pub struct SystemMatrixBuilder<'a> {
    kernel: &'a dyn GreenKernel,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ProgressFn>,
}

impl<'a> SystemMatrixBuilder<'a> {
    /// Allocates a new instance
    pub fn new(kernel: &'a dyn GreenKernel) -> Self {
        SystemMatrixBuilder {
            kernel,
            cancel: None,
            progress: None,
        }
    }

    /// Sets a flag that, once raised, stops the assembly at the next column
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) -> &mut Self {
        self.cancel = Some(flag);
        self
    }

    /// Sets a callback invoked after each finished column
    pub fn set_progress(&mut self, callback: ProgressFn) -> &mut Self {
        self.progress = Some(callback);
        self
    }

    /// Builds the system matrix
    ///
    /// # Input
    ///
    /// * `positions` -- observation position of each row
    /// * `directions` -- measurement direction of each row (e.g., the cardinal basis)
    /// * `model` -- the discretized fault and its slip bases
    ///
    /// # Output
    ///
    /// Returns G with shape `(positions.len(), model.n_unknown())`.
    pub fn build(
        &self,
        positions: &[[f64; 3]],
        directions: &[[f64; 3]],
        model: &FaultModel,
    ) -> Result<Matrix, InversionError> {
        if positions.len() != directions.len() {
            return Err(InversionError::DimensionMismatch(format!(
                "{} positions but {} measurement directions",
                positions.len(),
                directions.len()
            )));
        }
        let nrow = positions.len();
        let ncol = model.n_unknown();
        if nrow == 0 || ncol == 0 {
            return Err(InversionError::DimensionMismatch(format!(
                "cannot assemble a {} × {} system matrix",
                nrow, ncol
            )));
        }
        tracing::info!(nrow, ncol, "assembling system matrix");

        let finished = AtomicUsize::new(0);
        let mut gg = Matrix::new(nrow, ncol);
        gg.as_mut_data() // column-major: one chunk per column
            .par_chunks_mut(nrow)
            .enumerate()
            .try_for_each(|(col, column)| {
                if let Some(flag) = &self.cancel {
                    if flag.load(Ordering::Relaxed) {
                        return Err(InversionError::Cancelled);
                    }
                }
                let (patch, slip) = model.source(col);
                let mut u = [0.0; 3];
                for row in 0..nrow {
                    // consecutive rows often share a position (flattened components)
                    if row == 0 || positions[row] != positions[row - 1] {
                        u = self.kernel.evaluate(patch, slip, &positions[row])?;
                    }
                    column[row] = dot(&u, &directions[row]);
                }
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(callback) = &self.progress {
                    callback(done, ncol);
                }
                Ok(())
            })?;
        Ok(gg)
    }

    /// Builds the system matrix for three-component observations (east, north, up rows)
    pub fn build_for(&self, observations: &Observations, model: &FaultModel) -> Result<Matrix, InversionError> {
        let flat = observations.flatten();
        self.build(&flat.positions, &flat.directions, model)
    }
}

/// Calculates the predicted data `G · x`
pub fn predict(gg: &Matrix, slip: &Vector) -> Result<Vector, InversionError> {
    let (nrow, ncol) = gg.dims();
    if slip.dim() != ncol {
        return Err(InversionError::DimensionMismatch(format!(
            "G has {} columns but the slip vector has {} values",
            ncol,
            slip.dim()
        )));
    }
    let mut data = Vector::new(nrow);
    mat_vec_mul(&mut data, 1.0, gg, slip).map_err(InversionError::Numerical)?;
    Ok(data)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{predict, SystemMatrixBuilder};
    use crate::base::InversionError;
    use crate::geometry::{FaultModel, Patch, SlipBasis};
    use crate::inversion::Observations;
    use crate::kernel::{GreenKernel, OkadaKernel};
    use russell_lab::{approx_eq, Vector};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample_model() -> FaultModel {
        let segment = Patch::new([0.0, 0.0, -500.0], 4000.0, 2000.0, 20.0, 80.0).unwrap();
        FaultModel::new(&[segment], &[(4, 2)], SlipBasis::strike_dip()).unwrap()
    }

    fn sample_observations() -> Observations {
        let positions = vec![
            [-3000.0, 1000.0, 0.0],
            [2500.0, -1500.0, 0.0],
            [500.0, 4000.0, 0.0],
        ];
        Observations::at_points(positions)
    }

    #[test]
    fn build_captures_errors() {
        let kernel = OkadaKernel::default();
        let builder = SystemMatrixBuilder::new(&kernel);
        let model = sample_model();
        assert_eq!(
            builder.build(&[[0.0; 3]; 2], &[[1.0, 0.0, 0.0]], &model).err(),
            Some(InversionError::DimensionMismatch(
                "2 positions but 1 measurement directions".to_string()
            ))
        );
        assert_eq!(
            builder.build(&[], &[], &model).err(),
            Some(InversionError::DimensionMismatch(
                "cannot assemble a 0 × 16 system matrix".to_string()
            ))
        );
        assert_eq!(
            builder.build(&[[0.0, 0.0, 10.0]], &[[1.0, 0.0, 0.0]], &model).err(),
            Some(InversionError::KernelDomain(
                "observation point must lie on the free surface (z = 0)"
            ))
        );
    }

    #[test]
    fn build_works() {
        let kernel = OkadaKernel::default();
        let builder = SystemMatrixBuilder::new(&kernel);
        let model = sample_model();
        let obs = sample_observations();
        let gg = builder.build_for(&obs, &model).unwrap();
        assert_eq!(gg.dims(), (9, 16));
        for col in 0..16 {
            let (patch, slip) = model.source(col);
            for i in 0..3 {
                let u = kernel.evaluate(patch, slip, &obs.positions[i]).unwrap();
                for k in 0..3 {
                    approx_eq(gg.get(3 * i + k, col), u[k], 1e-15);
                }
            }
        }
    }

    #[test]
    fn build_projects_on_arbitrary_directions() {
        let kernel = OkadaKernel::default();
        let builder = SystemMatrixBuilder::new(&kernel);
        let model = sample_model();
        let h = f64::sqrt(0.5);
        let positions = [[1000.0, 1000.0, 0.0], [1000.0, 1000.0, 0.0]];
        let directions = [[h, h, 0.0], [0.0, 0.0, -1.0]];
        let gg = builder.build(&positions, &directions, &model).unwrap();
        for col in 0..model.n_unknown() {
            let (patch, slip) = model.source(col);
            let u = kernel.evaluate(patch, slip, &positions[0]).unwrap();
            approx_eq(gg.get(0, col), h * (u[0] + u[1]), 1e-15);
            approx_eq(gg.get(1, col), -u[2], 1e-15);
        }
    }

    #[test]
    fn zero_slip_predicts_zero_displacement() {
        let kernel = OkadaKernel::default();
        let builder = SystemMatrixBuilder::new(&kernel);
        let model = sample_model();
        let gg = builder.build_for(&sample_observations(), &model).unwrap();
        let slip = Vector::new(model.n_unknown());
        let data = predict(&gg, &slip).unwrap();
        assert!(data.as_data().iter().all(|v| *v == 0.0));
        assert_eq!(
            predict(&gg, &Vector::new(3)).err(),
            Some(InversionError::DimensionMismatch(
                "G has 16 columns but the slip vector has 3 values".to_string()
            ))
        );
    }

    #[test]
    fn progress_and_cancel_work() {
        let kernel = OkadaKernel::default();
        let model = sample_model();
        let obs = sample_observations();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut builder = SystemMatrixBuilder::new(&kernel);
        builder.set_progress(Arc::new(move |done, total| {
            assert!(done <= total);
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        builder.build_for(&obs, &model).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 16);

        let flag = Arc::new(AtomicBool::new(true));
        let mut builder = SystemMatrixBuilder::new(&kernel);
        builder.set_cancel_flag(flag);
        assert_eq!(builder.build_for(&obs, &model).err(), Some(InversionError::Cancelled));
    }
}
