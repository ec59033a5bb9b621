use crate::base::{InversionError, Regularization};
use crate::geometry::FaultModel;
use russell_lab::Matrix;

/// Builds the penalty operator L appended below G in the augmented system `[G; L] x = [d; 0]`
///
/// The smoothing operators act per slip direction: direction `k` of a patch is only
/// compared with direction `k` of its neighbours within the same segment.
#[derive(Clone, Copy, Debug)]
pub struct Regularizer {
    kind: Regularization,
    damping: f64,
}

impl Regularizer {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `kind` -- the penalty operator
    /// * `damping` -- the scaling coefficient (must be > 0)
    pub fn new(kind: Regularization, damping: f64) -> Result<Self, InversionError> {
        if !(damping > 0.0) || !damping.is_finite() {
            return Err(InversionError::InvalidInput("damping must be > 0.0"));
        }
        Ok(Regularizer { kind, damping })
    }

    /// Returns the kind of penalty operator
    pub fn kind(&self) -> Regularization {
        self.kind
    }

    /// Returns the damping coefficient
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Returns the minimum-norm operator `damping · I` of size `n_unknown`
    pub fn identity(n_unknown: usize, damping: f64) -> Result<Matrix, InversionError> {
        if n_unknown == 0 {
            return Err(InversionError::DimensionMismatch(
                "cannot regularize zero unknowns".to_string(),
            ));
        }
        if !(damping > 0.0) || !damping.is_finite() {
            return Err(InversionError::InvalidInput("damping must be > 0.0"));
        }
        let mut ll = Matrix::new(n_unknown, n_unknown);
        for i in 0..n_unknown {
            ll.set(i, i, damping);
        }
        Ok(ll)
    }

    /// Builds the penalty operator for the unknowns of a fault model
    ///
    /// # Output
    ///
    /// * `Damping` -- `n_unknown × n_unknown`
    /// * `FirstDifference` -- `(n_adjacent_pairs · n_direction) × n_unknown`
    /// * `Laplacian` -- `n_unknown × n_unknown`
    pub fn build(&self, model: &FaultModel) -> Result<Matrix, InversionError> {
        let n = model.n_unknown();
        let nd = model.n_direction();
        match self.kind {
            Regularization::Damping => Regularizer::identity(n, self.damping),
            Regularization::FirstDifference => {
                let pairs = model.adjacent_pairs();
                if pairs.is_empty() {
                    return Err(InversionError::InvalidInput(
                        "smoothing requires at least two adjacent patches",
                    ));
                }
                let mut ll = Matrix::new(pairs.len() * nd, n);
                for (r, (a, b)) in pairs.iter().enumerate() {
                    for k in 0..nd {
                        ll.set(r * nd + k, a * nd + k, self.damping);
                        ll.set(r * nd + k, b * nd + k, -self.damping);
                    }
                }
                Ok(ll)
            }
            Regularization::Laplacian => {
                if model.adjacent_pairs().is_empty() {
                    return Err(InversionError::InvalidInput(
                        "smoothing requires at least two adjacent patches",
                    ));
                }
                let mut ll = Matrix::new(n, n);
                for p in 0..model.n_patch() {
                    let neighbors = model.neighbors(p);
                    for k in 0..nd {
                        let row = p * nd + k;
                        ll.set(row, row, -(neighbors.len() as f64) * self.damping);
                        for q in &neighbors {
                            ll.set(row, q * nd + k, self.damping);
                        }
                    }
                }
                Ok(ll)
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
