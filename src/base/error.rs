use crate::StrError;
use thiserror::Error;

/// Defines the errors raised while building and solving an inversion
///
/// Geometry and dimension errors are raised at construction or assembly time and
/// no partial result is returned. Kernel singularities are first stabilized by the
/// kernel itself; only those that cannot be stabilized reach the caller.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum InversionError {
    /// Invalid patch dimensions, orientation, or discretization counts
    #[error("geometry error: {0}")]
    Geometry(StrError),

    /// Invalid physical parameters or an observation point the kernel cannot evaluate
    #[error("kernel domain error: {0}")]
    KernelDomain(StrError),

    /// Inconsistent array lengths entering the matrix assembly or the solver
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The NNLS iteration limit was reached before the KKT conditions were satisfied
    ///
    /// `best` holds the last (feasible, non-negative) iterate.
    #[error("NNLS solver did not converge after {iterations} iterations")]
    Convergence { iterations: usize, best: Vec<f64> },

    /// Invalid configuration or input value
    #[error("invalid input: {0}")]
    InvalidInput(StrError),

    /// Inconsistent configuration (message from `Config::validate`)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by a dense linear algebra routine
    #[error("numerical error: {0}")]
    Numerical(StrError),

    /// The matrix assembly was cancelled at a column checkpoint
    #[error("matrix assembly cancelled")]
    Cancelled,

    /// Failure reading or writing a file
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for InversionError {
    fn from(err: std::io::Error) -> Self {
        InversionError::Io(err.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
