//! Command dispatch and handlers.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use improver::config::ConfigIO;
use improver::cube::load_cubes;
use improver::metadata::{amend_attributes, set_history_attribute};
use improver::standardise::StandardiseMetadata;
use improver::{
    CalibrationConfig, CalibrationError, Cube, Distribution, EmosCoefficients, EnsembleCalibration,
    EstimateCoefficients,
};
use log::info;

use crate::cli::{Command, EstimationOptions, MetadataOptions};

pub fn handle(command: Command, config_path: Option<&Path>) -> Result<(), CalibrationError> {
    match command {
        Command::EnsembleCalibration(args) => {
            let mut config = build_config(config_path, &args.units, args.distribution, &args.estimation)?;
            if args.random_seed.is_some() {
                config.random_seed = args.random_seed;
            }
            let current = Cube::load(&args.input)?;
            let historic_forecasts = load_cubes(&args.historic_forecasts)?;
            let truths = load_cubes(&args.truths)?;
            info!(
                "Loaded {} historic forecasts and {} truths.",
                historic_forecasts.len(),
                truths.len()
            );
            let mut output =
                EnsembleCalibration::new(config)?.process(&current, &historic_forecasts, &truths)?;
            update_metadata(&mut output, &args.metadata)?;
            output.save(&args.output)
        }
        Command::EstimateEmosCoefficients(args) => {
            let config = build_config(config_path, &args.units, args.distribution, &args.estimation)?;
            let historic_forecasts = load_cubes(&args.historic_forecasts)?;
            let truths = load_cubes(&args.truths)?;
            let coefficients = EstimateCoefficients::new(config)?.process(&historic_forecasts, &truths)?;
            coefficients.save(&args.output)
        }
        Command::ApplyEmosCoefficients(args) => {
            let mut config = load_config(config_path)?;
            if let Some(predictor) = args.predictor_of_mean {
                config.predictor = predictor;
            }
            if args.random_seed.is_some() {
                config.random_seed = args.random_seed;
            }
            let coefficients = EmosCoefficients::load(&args.coefficients)?;
            let current = Cube::load(&args.input)?;
            let mut output = EnsembleCalibration::new(config)?.apply_coefficients(
                &current,
                &coefficients,
                args.predictor_of_mean.is_some(),
            )?;
            update_metadata(&mut output, &args.metadata)?;
            output.save(&args.output)
        }
        Command::Standardise(args) => {
            let plugin = StandardiseMetadata {
                new_name: args.new_name,
                new_units: args.new_units,
                attributes: match &args.attributes_config {
                    Some(path) => load_amendments(path)?,
                    None => BTreeMap::new(),
                },
            };
            plugin.process(Cube::load(&args.input)?)?.save(&args.output)
        }
    }
}

fn load_config(config_path: Option<&Path>) -> Result<CalibrationConfig, CalibrationError> {
    match config_path {
        Some(path) => CalibrationConfig::load_config(path),
        None => Ok(CalibrationConfig::default()),
    }
}

/// Configuration from the optional config file, overridden by explicit arguments.
fn build_config(
    config_path: Option<&Path>,
    units: &str,
    distribution: Distribution,
    options: &EstimationOptions,
) -> Result<CalibrationConfig, CalibrationError> {
    let mut config = load_config(config_path)?;
    config.units = units.to_string();
    config.distribution = distribution;
    if let Some(predictor) = options.predictor_of_mean {
        config.predictor = predictor;
    }
    if let Some(max_iterations) = options.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(tolerance) = options.tolerance {
        config.tolerance = tolerance;
    }
    config.point_by_point |= options.point_by_point;
    config.use_default_initial_guess |= options.use_default_initial_guess;
    Ok(config)
}

fn load_amendments(path: &Path) -> Result<BTreeMap<String, String>, CalibrationError> {
    let json_str = fs::read_to_string(path).map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
    serde_json::from_str(&json_str).map_err(|e| CalibrationError::UnableToRead(e.to_string()))
}

fn update_metadata(cube: &mut Cube, options: &MetadataOptions) -> Result<(), CalibrationError> {
    if let Some(path) = &options.attributes_config {
        amend_attributes(cube, &load_amendments(path)?);
    }
    if let Some(history) = &options.history {
        set_history_attribute(cube, history, true);
    }
    Ok(())
}
