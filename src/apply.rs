//! Apply
//!
//! Application of EMOS coefficients to a forecast, giving the location and
//! scale of the calibrated predictive distribution at every grid point.
use crate::coefficients::EmosCoefficients;
use crate::cube::Cube;
use crate::distribution::{Distribution, PredictorOfMean};
use crate::errors::CalibrationError;
use crate::units;
use crate::utils::{mean, variance};
use log::warn;
use rayon::prelude::*;

/// Predictive distribution parameters per grid point.
#[derive(Debug, Clone)]
pub struct CalibratedDistribution {
    pub distribution: Distribution,
    pub location: Vec<f64>,
    /// Standard deviation.
    pub scale: Vec<f64>,
}

pub struct ApplyCoefficients<'a> {
    coefficients: &'a EmosCoefficients,
}

impl<'a> ApplyCoefficients<'a> {
    /// Wrap coefficients for application, checking they were estimated with
    /// the expected predictor when one is given.
    pub fn new(
        coefficients: &'a EmosCoefficients,
        expected_predictor: Option<PredictorOfMean>,
    ) -> Result<Self, CalibrationError> {
        if let Some(predictor) = expected_predictor {
            if predictor != coefficients.predictor {
                return Err(CalibrationError::InvalidParameter(
                    "predictor_of_mean".to_string(),
                    coefficients.predictor.to_string(),
                    predictor.to_string(),
                ));
            }
        }
        Ok(ApplyCoefficients { coefficients })
    }

    fn check_forecast(&self, forecast: &Cube) -> Result<(), CalibrationError> {
        let c = self.coefficients;
        c.validate()?;
        if !units::same_unit(&forecast.units, &c.units) {
            return Err(CalibrationError::InvalidParameter(
                "units".to_string(),
                c.units.clone(),
                forecast.units.clone(),
            ));
        }
        if c.predictor == PredictorOfMean::Realizations && forecast.n_realizations() != c.n_realizations {
            return Err(CalibrationError::InvalidParameter(
                "realization".to_string(),
                format!("{} realizations", c.n_realizations),
                forecast.n_realizations().to_string(),
            ));
        }
        if c.is_point_by_point() && c.coefficients.len() != forecast.n_points() {
            return Err(CalibrationError::InvalidParameter(
                "coefficients".to_string(),
                format!("one set per grid point ({})", forecast.n_points()),
                c.coefficients.len().to_string(),
            ));
        }
        if c.forecast_period.is_some() && forecast.forecast_period() != c.forecast_period {
            warn!(
                "Forecast period {:?} differs from the {:?} the coefficients were estimated for.",
                forecast.forecast_period(),
                c.forecast_period
            );
        }
        Ok(())
    }

    /// Location and scale at every grid point of `forecast`.
    ///
    /// The forecast must be in the units of the coefficients. Points with a
    /// missing realization give NaN.
    pub fn process(&self, forecast: &Cube) -> Result<CalibratedDistribution, CalibrationError> {
        self.check_forecast(forecast)?;
        let predictor = self.coefficients.predictor;
        let (location, scale): (Vec<f64>, Vec<f64>) = (0..forecast.n_points())
            .into_par_iter()
            .map(|p| {
                let members = forecast.point_values(p);
                if members.iter().any(|v| v.is_nan()) {
                    return (f64::NAN, f64::NAN);
                }
                let coefficients = self.coefficients.for_point(p);
                let location = match predictor {
                    PredictorOfMean::Mean => coefficients.location(&[mean(&members)]),
                    PredictorOfMean::Realizations => coefficients.location(&members),
                };
                (location, coefficients.scale(variance(&members)))
            })
            .unzip();
        Ok(CalibratedDistribution {
            distribution: self.coefficients.distribution,
            location,
            scale,
        })
    }
}
