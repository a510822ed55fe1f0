//! Ensemble Calibration
//!
//! End-to-end EMOS calibration of a raw ensemble: estimate coefficients from a
//! training period, apply them to the current forecast, and return calibrated
//! realizations.
use crate::apply::ApplyCoefficients;
use crate::coefficients::EmosCoefficients;
use crate::config::CalibrationConfig;
use crate::cube::Cube;
use crate::ensemble_copula_coupling::{choose_set_of_percentiles, generate_percentiles, EnsembleReordering};
use crate::errors::CalibrationError;
use crate::estimate::EstimateCoefficients;
use log::info;

pub struct EnsembleCalibration {
    pub config: CalibrationConfig,
}

impl EnsembleCalibration {
    pub fn new(config: CalibrationConfig) -> Result<Self, CalibrationError> {
        config.validate()?;
        Ok(EnsembleCalibration { config })
    }

    /// Calibrate `current` with coefficients estimated from `historic_forecasts`
    /// and `truths`.
    ///
    /// The output keeps the realization coordinate and units of `current`.
    pub fn process(
        &self,
        current: &Cube,
        historic_forecasts: &[Cube],
        truths: &[Cube],
    ) -> Result<Cube, CalibrationError> {
        let coefficients = EstimateCoefficients::new(self.config.clone())?.process(historic_forecasts, truths)?;
        self.apply_coefficients(current, &coefficients, true)
    }

    /// Calibrate `current` with previously estimated coefficients.
    ///
    /// When `check_predictor` is set the coefficients must have been estimated
    /// with the configured predictor.
    pub fn apply_coefficients(
        &self,
        current: &Cube,
        coefficients: &EmosCoefficients,
        check_predictor: bool,
    ) -> Result<Cube, CalibrationError> {
        if current.realization.is_none() {
            return Err(CalibrationError::InvalidCube(format!(
                "{} has no realization coordinate to calibrate",
                current.name
            )));
        }
        let mut forecast = current.clone();
        forecast.convert_units(&coefficients.units)?;

        let expected_predictor = check_predictor.then_some(self.config.predictor);
        let calibrated = ApplyCoefficients::new(coefficients, expected_predictor)?.process(&forecast)?;

        let n_realizations = forecast.n_realizations();
        let percentiles = choose_set_of_percentiles(n_realizations);
        let values = generate_percentiles(
            &calibrated.location,
            &calibrated.scale,
            calibrated.distribution,
            &percentiles,
        );
        let reordered = EnsembleReordering::new(self.config.random_seed).process(&forecast, &values)?;
        info!(
            "Calibrated {} realizations at {} grid points with {} {} coefficients.",
            n_realizations,
            forecast.n_points(),
            coefficients.distribution,
            coefficients.predictor
        );

        let data = reordered.into_iter().map(|v| v as f32).collect();
        let mut output = forecast.copy_with_data(current.realization.clone(), data);
        output.convert_units(&current.units)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::PredictorOfMean;
    use crate::estimate::tests::training_data;
    use crate::metrics::mean_ensemble_crps;

    fn config(predictor: PredictorOfMean) -> CalibrationConfig {
        CalibrationConfig {
            predictor,
            max_iterations: 300,
            random_seed: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_calibration_improves_crps() {
        let (mut forecasts, mut truths) = training_data(12, 30, 4);
        let current = forecasts.pop().unwrap();
        let current_truth = truths.pop().unwrap();
        let plugin = EnsembleCalibration::new(config(PredictorOfMean::Mean)).unwrap();
        let output = plugin.process(&current, &forecasts, &truths).unwrap();
        assert_eq!(output.realization, current.realization);
        assert_eq!(output.units, "K");
        let raw = mean_ensemble_crps(&current, &current_truth).unwrap();
        let calibrated = mean_ensemble_crps(&output, &current_truth).unwrap();
        assert!(calibrated < raw, "calibrated {} raw {}", calibrated, raw);
    }

    #[test]
    fn test_seeded_output_is_deterministic() {
        let (mut forecasts, truths) = training_data(6, 10, 3);
        let current = forecasts.pop().unwrap();
        let plugin = EnsembleCalibration::new(config(PredictorOfMean::Realizations)).unwrap();
        let a = plugin.process(&current, &forecasts, &truths[..5]).unwrap();
        let b = plugin.process(&current, &forecasts, &truths[..5]).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_output_in_input_units() {
        let (mut forecasts, truths) = training_data(6, 10, 3);
        let mut current = forecasts.pop().unwrap();
        current.data.iter_mut().for_each(|v| *v -= 273.15);
        current.units = "degC".to_string();
        let plugin = EnsembleCalibration::new(config(PredictorOfMean::Mean)).unwrap();
        let output = plugin.process(&current, &forecasts, &truths[..5]).unwrap();
        assert_eq!(output.units, "degC");
        assert!(output.data.iter().all(|v| *v > -20.0 && *v < 30.0));
    }

    #[test]
    fn test_rank_structure_is_kept() {
        let (mut forecasts, truths) = training_data(6, 10, 3);
        let current = forecasts.pop().unwrap();
        let plugin = EnsembleCalibration::new(config(PredictorOfMean::Mean)).unwrap();
        let output = plugin.process(&current, &forecasts, &truths[..5]).unwrap();
        for p in 0..current.n_points() {
            let raw = current.point_values(p);
            let calibrated = output.point_values(p);
            for i in 0..raw.len() {
                for j in 0..raw.len() {
                    if raw[i] < raw[j] {
                        assert!(calibrated[i] <= calibrated[j]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic_input_rejected() {
        let (forecasts, truths) = training_data(3, 4, 3);
        let plugin = EnsembleCalibration::new(config(PredictorOfMean::Mean)).unwrap();
        assert!(matches!(
            plugin.process(&truths[0], &forecasts, &truths),
            Err(CalibrationError::InvalidCube(_))
        ));
    }
}
