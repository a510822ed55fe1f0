/// Returned by the CRPS objectives when the score is not finite.
pub const BAD_VALUE: f64 = 999_999.0;
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_TOLERANCE: f64 = 0.02;
/// Percentage change in CRPS over the final iteration above which a warning is raised.
pub const CRPS_CHANGE_WARNING_THRESHOLD: f64 = 5.0;
/// Samples per chunk in the parallel CRPS reduction.
pub const CRPS_CHUNK_SIZE: usize = 4096;
pub const GRID_TOLERANCE: f64 = 1e-6;

// Nelder-Mead simplex construction and update coefficients.
pub const NONZERO_DELTA: f64 = 0.05;
pub const ZERO_DELTA: f64 = 0.00025;
pub const REFLECTION: f64 = 1.0;
pub const EXPANSION: f64 = 2.0;
pub const CONTRACTION: f64 = 0.5;
pub const SHRINK: f64 = 0.5;
