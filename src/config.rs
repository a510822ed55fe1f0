//! Calibration Configuration
//!
//! Settings shared by coefficient estimation and application, with JSON IO.
use crate::constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::distribution::{Distribution, PredictorOfMean};
use crate::errors::CalibrationError;
use crate::units;
use crate::utils::validate_positive_float_parameter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_units() -> String {
    "K".to_string()
}
fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}
fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}
fn default_random_seed() -> Option<u64> {
    None
}

/// Configuration for EMOS calibration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationConfig {
    /// Predictive distribution.
    #[serde(default)]
    pub distribution: Distribution,
    /// Ensemble mean or individual realizations as the location predictor.
    #[serde(default)]
    pub predictor: PredictorOfMean,
    /// Units the calibration is performed in.
    #[serde(default = "default_units")]
    pub units: String,
    /// Hard limit for the number of minimiser iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Absolute tolerance on the CRPS and coefficients for convergence.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Seed for tie-breaking when reordering calibrated values.
    #[serde(default = "default_random_seed")]
    pub random_seed: Option<u64>,
    /// Estimate separate coefficients at every grid point.
    #[serde(default)]
    pub point_by_point: bool,
    /// Start the minimiser from fixed defaults rather than a linear model.
    #[serde(default)]
    pub use_default_initial_guess: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            distribution: Distribution::Gaussian,
            predictor: PredictorOfMean::Mean,
            units: default_units(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            random_seed: None,
            point_by_point: false,
            use_default_initial_guess: false,
        }
    }
}

impl CalibrationConfig {
    /// Check parameter ranges and that the calibration units are known.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.max_iterations == 0 {
            return Err(CalibrationError::InvalidParameter(
                "max_iterations".to_string(),
                "a positive integer".to_string(),
                self.max_iterations.to_string(),
            ));
        }
        validate_positive_float_parameter(self.tolerance, "tolerance")?;
        units::dimension(&self.units)?;
        Ok(())
    }
}

/// IO
pub trait ConfigIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        fs::write(path, self.json_dump()?).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object
    fn json_dump(&self) -> Result<String, CalibrationError> {
        serde_json::to_string(self).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    /// Load from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, CalibrationError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| CalibrationError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let json_str = fs::read_to_string(path).map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConfigIO for CalibrationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = CalibrationConfig::default();
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.tolerance, 0.02);
        assert_eq!(config.units, "K");
        assert!(config.random_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_io_json() {
        let config = CalibrationConfig {
            random_seed: Some(0),
            predictor: PredictorOfMean::Realizations,
            ..Default::default()
        };
        let json = config.json_dump().unwrap();
        let config2 = CalibrationConfig::from_json(&json).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_config_io_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.json");
        let config = CalibrationConfig::default();
        config.save_config(&file_path).unwrap();
        let config2 = CalibrationConfig::load_config(&file_path).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"distribution": "truncated_gaussian", "max_iterations": 150}"#;
        let config = CalibrationConfig::from_json(json).unwrap();
        assert_eq!(config.distribution, Distribution::TruncatedGaussian);
        assert_eq!(config.max_iterations, 150);
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.predictor, PredictorOfMean::Mean);
    }

    #[test]
    fn test_validate() {
        let config = CalibrationConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = CalibrationConfig {
            tolerance: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = CalibrationConfig {
            units: "parsecs".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
