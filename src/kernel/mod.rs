//! Implements the elastic half-space Green's functions

mod green_kernel;
mod okada;
pub use crate::kernel::green_kernel::*;
pub use crate::kernel::okada::*;
