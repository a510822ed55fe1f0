//! CLI parsing and logging setup.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use improver::{Distribution, PredictorOfMean};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "improver",
    version,
    about = "Ensemble calibration for meteorological post-processing",
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// JSON calibration config; explicit flags take precedence.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate EMOS coefficients and apply them to the input forecast.
    EnsembleCalibration(EnsembleCalibrationArgs),
    /// Estimate EMOS coefficients and write them as JSON.
    EstimateEmosCoefficients(EstimateArgs),
    /// Apply previously estimated EMOS coefficients to a forecast.
    ApplyEmosCoefficients(ApplyArgs),
    /// Rename, convert units and amend attributes of a cube.
    Standardise(StandardiseArgs),
}

#[derive(Debug, Args)]
pub struct EnsembleCalibrationArgs {
    /// Units in which the calibration is performed, e.g. K.
    pub units: String,
    /// Predictive distribution: gaussian or truncated_gaussian.
    pub distribution: Distribution,
    /// Raw ensemble forecast to calibrate.
    pub input: PathBuf,
    /// Glob matching the historic forecasts.
    pub historic_forecasts: String,
    /// Glob matching the truths.
    pub truths: String,
    /// Calibrated forecast to write.
    pub output: PathBuf,
    #[command(flatten)]
    pub estimation: EstimationOptions,
    #[arg(long = "random_seed")]
    pub random_seed: Option<u64>,
    #[command(flatten)]
    pub metadata: MetadataOptions,
}

#[derive(Debug, Args)]
pub struct EstimateArgs {
    pub units: String,
    pub distribution: Distribution,
    pub historic_forecasts: String,
    pub truths: String,
    /// Coefficients file to write.
    pub output: PathBuf,
    #[command(flatten)]
    pub estimation: EstimationOptions,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    pub input: PathBuf,
    /// Coefficients written by estimate-emos-coefficients.
    pub coefficients: PathBuf,
    pub output: PathBuf,
    /// Reject coefficients estimated with a different predictor.
    #[arg(long = "predictor_of_mean")]
    pub predictor_of_mean: Option<PredictorOfMean>,
    #[arg(long = "random_seed")]
    pub random_seed: Option<u64>,
    #[command(flatten)]
    pub metadata: MetadataOptions,
}

#[derive(Debug, Args)]
pub struct StandardiseArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    #[arg(long = "new_name")]
    pub new_name: Option<String>,
    #[arg(long = "new_units")]
    pub new_units: Option<String>,
    /// JSON object of attribute amendments; the value "remove" deletes an attribute.
    #[arg(long = "attributes_config")]
    pub attributes_config: Option<PathBuf>,
}

#[derive(Debug, Args, Default)]
pub struct EstimationOptions {
    #[arg(long = "predictor_of_mean")]
    pub predictor_of_mean: Option<PredictorOfMean>,
    #[arg(long = "max_iterations")]
    pub max_iterations: Option<usize>,
    #[arg(long)]
    pub tolerance: Option<f64>,
    #[arg(long = "point_by_point")]
    pub point_by_point: bool,
    #[arg(long = "use_default_initial_guess")]
    pub use_default_initial_guess: bool,
}

#[derive(Debug, Args, Default)]
pub struct MetadataOptions {
    /// JSON object of attribute amendments; the value "remove" deletes an attribute.
    #[arg(long = "attributes_config")]
    pub attributes_config: Option<PathBuf>,
    /// Text appended to the history attribute of the output.
    #[arg(long)]
    pub history: Option<String>,
}

pub fn init_logging(verbose: bool, log_level: Option<&str>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => {
            if verbose {
                EnvFilter::new("info")
            } else {
                EnvFilter::new("warn")
            }
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}
