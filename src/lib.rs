//! Slipinv -- Coseismic fault slip inversion
//!
//! Estimates the slip distribution on a discretized fault surface from surface
//! geodetic displacements. The forward operator is assembled from Okada's
//! closed-form solution for a rectangular dislocation in an elastic half-space
//! and the slip is recovered by regularized non-negative least squares.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod geometry;
pub mod inversion;
pub mod io;
pub mod kernel;
pub mod prelude;
