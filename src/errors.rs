//! Errors
//!
//! Custom error types used throughout the `improver` crate.
use thiserror::Error;

/// Errors that can occur while calibrating an ensemble.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Unable to write a cube or coefficients to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read a cube or coefficients from file.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Units can not be converted into one another.
    #[error("Unable to convert units from {0} to {1}.")]
    IncompatibleUnits(String, String),
    /// Spatial coordinates of two cubes differ.
    #[error("Grids do not match: {0}")]
    MismatchedGrids(String),
    /// None of the historic forecasts share a validity time with a truth.
    #[error("No historic forecast has a truth with a matching validity time.")]
    NoMatchingTruth,
    /// A glob pattern did not expand to any file.
    #[error("No files matched the pattern {0}")]
    NoFilesMatched(String),
    /// Cube contents violate the expected layout.
    #[error("Invalid cube: {0}")]
    InvalidCube(String),
}
