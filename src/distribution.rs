//! Distribution
//!
//! The predictive distributions and predictor choices supported by EMOS.
use crate::errors::CalibrationError;
use crate::stats::{norm_ppf, truncnorm_ppf};
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Predictive distribution fitted to the ensemble.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Normal distribution, e.g. for temperature.
    #[default]
    Gaussian,
    /// Normal distribution truncated below at zero, e.g. for wind speed.
    TruncatedGaussian,
}

impl Distribution {
    /// Quantile at probability `p` of the distribution with the given location and scale.
    pub fn ppf(&self, p: f64, loc: f64, scale: f64) -> f64 {
        match self {
            Distribution::Gaussian => loc + scale * norm_ppf(p),
            Distribution::TruncatedGaussian => truncnorm_ppf(p, loc, scale),
        }
    }
}

impl FromStr for Distribution {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gaussian" | "norm" => Ok(Distribution::Gaussian),
            "truncated_gaussian" | "truncnorm" => Ok(Distribution::TruncatedGaussian),
            _ => Err(CalibrationError::ParseString(
                s.to_string(),
                "Distribution".to_string(),
                items_to_strings(vec!["gaussian", "truncated_gaussian"]),
            )),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Gaussian => write!(f, "gaussian"),
            Distribution::TruncatedGaussian => write!(f, "truncated_gaussian"),
        }
    }
}

/// Whether the location is regressed on the ensemble mean or on every realization.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PredictorOfMean {
    #[default]
    Mean,
    Realizations,
}

impl FromStr for PredictorOfMean {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(PredictorOfMean::Mean),
            "realizations" => Ok(PredictorOfMean::Realizations),
            _ => Err(CalibrationError::ParseString(
                s.to_string(),
                "PredictorOfMean".to_string(),
                items_to_strings(vec!["mean", "realizations"]),
            )),
        }
    }
}

impl fmt::Display for PredictorOfMean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorOfMean::Mean => write!(f, "mean"),
            PredictorOfMean::Realizations => write!(f, "realizations"),
        }
    }
}
