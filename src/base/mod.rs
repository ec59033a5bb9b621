//! Implements the base structures for a slip inversion

mod config;
mod constants;
mod error;
mod samples;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::error::*;
pub use crate::base::samples::*;
