//! Implements the forward operator, the penalty operators, and the non-negative solver

mod nnls;
mod observations;
mod regularizer;
mod slip_inversion;
mod synthetic;
mod system_matrix;
pub use crate::inversion::nnls::*;
pub use crate::inversion::observations::*;
pub use crate::inversion::regularizer::*;
pub use crate::inversion::slip_inversion::*;
pub use crate::inversion::synthetic::*;
pub use crate::inversion::system_matrix::*;
