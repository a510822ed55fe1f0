// Modules
pub mod apply;
pub mod coefficients;
pub mod config;
pub mod constants;
pub mod cube;
pub mod distribution;
pub mod ensemble_calibration;
pub mod ensemble_copula_coupling;
pub mod errors;
pub mod estimate;
pub mod metadata;
pub mod metrics;
pub mod objective;
pub mod optimizer;
pub mod regression;
pub mod standardise;
pub mod stats;
pub mod units;
pub mod utils;

// Individual classes, and functions
pub use coefficients::{CoefficientSet, EmosCoefficients};
pub use config::{CalibrationConfig, ConfigIO};
pub use cube::Cube;
pub use distribution::{Distribution, PredictorOfMean};
pub use ensemble_calibration::EnsembleCalibration;
pub use errors::CalibrationError;
pub use estimate::EstimateCoefficients;
