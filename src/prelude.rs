//! Makes available common structures needed to run an inversion
//!
//! You may write `use slipinv::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{
    Config, InversionError, Regularization, Samples, SegmentConfig, DEFAULT_OUT_DIR, DEFAULT_TEST_DIR,
};
pub use crate::geometry::{cardinal_components, FaultModel, Patch, SlipBasis};
pub use crate::inversion::{
    predict, InversionResults, NnlsSolver, Observations, Regularizer, SlipInversion, SyntheticData,
    SystemMatrixBuilder,
};
pub use crate::io::{MapProjection, ObservationRecord, SlipRecord, TransverseMercator};
pub use crate::kernel::{GreenKernel, OkadaKernel};
pub use crate::StrError;
