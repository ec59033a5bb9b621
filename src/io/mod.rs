//! Implements the observation and slip files and the map projection

mod projection;
mod records;
pub use crate::io::projection::*;
pub use crate::io::records::*;
