//! Implements the fault geometry: patches, slip bases, and the discretized fault model

mod fault_model;
mod patch;
mod slip_basis;
pub use crate::geometry::fault_model::*;
pub use crate::geometry::patch::*;
pub use crate::geometry::slip_basis::*;
