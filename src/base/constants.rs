/// Defines the directory where the inversion result files are saved
pub const DEFAULT_OUT_DIR: &str = "/tmp/slipinv/results";

/// Defines an auxiliary directory where the test result files are saved
pub const DEFAULT_TEST_DIR: &str = "/tmp/slipinv/test";

/// Default Poisson's coefficient of the elastic half-space (λ = μ)
pub const DEFAULT_POISSON: f64 = 0.25;

/// Default damping coefficient of the regularization operator
pub const DEFAULT_DAMPING: f64 = 0.001;

/// Default tolerance on the KKT conditions of the NNLS solver
pub const DEFAULT_NNLS_TOLERANCE: f64 = 1e-10;

/// Absolute tolerance used to decide whether a point lies on the free surface (z = 0)
pub const SURFACE_TOLERANCE: f64 = 1e-6;
