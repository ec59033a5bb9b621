use super::{predict, Observations, SystemMatrixBuilder};
use crate::base::InversionError;
use crate::geometry::FaultModel;
use crate::kernel::GreenKernel;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use russell_lab::{Matrix, Vector};

/// Generates synthetic displacements from a known slip distribution
///
/// The noise is Gaussian with zero mean and standard deviation `noise_std`, drawn from a
/// generator seeded with `seed`; the same seed always produces the same data.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticData {
    /// Standard deviation of the noise (≥ 0)
    pub noise_std: f64,

    /// Seed of the random number generator
    pub seed: u64,
}

impl SyntheticData {
    /// Allocates a new instance
    pub fn new(noise_std: f64, seed: u64) -> Result<Self, InversionError> {
        if !(noise_std >= 0.0) || !noise_std.is_finite() {
            return Err(InversionError::InvalidInput("noise standard deviation must be ≥ 0.0"));
        }
        Ok(SyntheticData { noise_std, seed })
    }

    /// Calculates `G · x` plus noise
    pub fn generate(&self, gg: &Matrix, slip: &Vector) -> Result<Vector, InversionError> {
        let mut data = predict(gg, slip)?;
        if self.noise_std > 0.0 {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let noise = Normal::new(0.0, self.noise_std)
                .map_err(|_| InversionError::InvalidInput("noise standard deviation must be ≥ 0.0"))?;
            for i in 0..data.dim() {
                data[i] += noise.sample(&mut rng);
            }
        }
        Ok(data)
    }

    /// Generates three-component observations at the given surface points
    ///
    /// The standard deviations of the returned observations equal `noise_std`.
    pub fn observations(
        &self,
        kernel: &dyn GreenKernel,
        model: &FaultModel,
        positions: Vec<[f64; 3]>,
        slip: &Vector,
    ) -> Result<Observations, InversionError> {
        let points = Observations::at_points(positions);
        let gg = SystemMatrixBuilder::new(kernel).build_for(&points, model)?;
        let data = self.generate(&gg, slip)?;
        let n = points.len();
        tracing::info!(n_point = n, noise_std = self.noise_std, seed = self.seed, "generated synthetic data");
        Observations::new(
            points.positions,
            Observations::unflatten(&data)?,
            vec![[self.noise_std; 3]; n],
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
