//! Coefficients
//!
//! EMOS coefficients and the container written between the estimation and
//! application steps.
use crate::distribution::{Distribution, PredictorOfMean};
use crate::errors::CalibrationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One set of EMOS coefficients.
///
/// Location is `alpha + Σ beta_i · predictor_i` and variance is
/// `gamma² + delta² · ensemble_variance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub alpha: f64,
    pub beta: Vec<f64>,
    pub gamma: f64,
    pub delta: f64,
}

impl CoefficientSet {
    /// Decode a minimiser parameter vector `[alpha, beta.., gamma, delta]`.
    ///
    /// For the realizations predictor the betas are squared so the weights
    /// given to each realization can not be negative.
    pub fn from_params(params: &[f64], predictor: PredictorOfMean) -> Self {
        let n = params.len();
        let beta = params[1..n - 2]
            .iter()
            .map(|b| match predictor {
                PredictorOfMean::Mean => *b,
                PredictorOfMean::Realizations => b * b,
            })
            .collect();
        CoefficientSet {
            alpha: params[0],
            beta,
            gamma: params[n - 2],
            delta: params[n - 1],
        }
    }

    /// Default coefficients: location equal to the predictor, spread equal to the ensemble spread.
    pub fn identity(n_predictors: usize, predictor: PredictorOfMean) -> Self {
        let beta = match predictor {
            PredictorOfMean::Mean => vec![1.0; n_predictors],
            PredictorOfMean::Realizations => vec![1.0 / n_predictors as f64; n_predictors],
        };
        CoefficientSet {
            alpha: 0.0,
            beta,
            gamma: 0.0,
            delta: 1.0,
        }
    }

    #[inline]
    pub fn location(&self, predictors: &[f64]) -> f64 {
        self.alpha + self.beta.iter().zip(predictors).map(|(b, x)| b * x).sum::<f64>()
    }

    /// Standard deviation of the predictive distribution.
    #[inline]
    pub fn scale(&self, ensemble_variance: f64) -> f64 {
        (self.gamma * self.gamma + self.delta * self.delta * ensemble_variance).sqrt()
    }
}

/// Coefficients estimated from a training period, with their provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmosCoefficients {
    pub distribution: Distribution,
    pub predictor: PredictorOfMean,
    /// Units the coefficients were estimated in.
    pub units: String,
    /// Lead time of the training forecasts, seconds.
    pub forecast_period: Option<i64>,
    /// Number of realizations the coefficients expect.
    pub n_realizations: usize,
    /// A single set for the whole domain, or one set per grid point.
    pub coefficients: Vec<CoefficientSet>,
    /// Final mean CRPS of each minimisation, `None` where there was nothing to fit.
    pub crps: Vec<Option<f64>>,
    /// Iterations used by each minimisation.
    pub iterations: Vec<usize>,
    /// Whether each minimisation converged.
    pub converged: Vec<bool>,
}

impl EmosCoefficients {
    pub fn is_point_by_point(&self) -> bool {
        self.coefficients.len() > 1
    }

    /// Coefficients to use at grid point `p`.
    pub fn for_point(&self, p: usize) -> &CoefficientSet {
        if self.is_point_by_point() {
            &self.coefficients[p]
        } else {
            &self.coefficients[0]
        }
    }

    /// Save coefficients as a json object to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        fs::write(path, self.json_dump()?).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    pub fn json_dump(&self) -> Result<String, CalibrationError> {
        serde_json::to_string_pretty(self).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    /// Number of betas each coefficient set must hold.
    pub fn n_predictors(&self) -> usize {
        match self.predictor {
            PredictorOfMean::Mean => 1,
            PredictorOfMean::Realizations => self.n_realizations,
        }
    }

    /// Check the coefficient sets are usable with the predictor they were estimated for.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.coefficients.is_empty() {
            return Err(CalibrationError::InvalidParameter(
                "coefficients".to_string(),
                "at least one coefficient set".to_string(),
                "none".to_string(),
            ));
        }
        let n_predictors = self.n_predictors();
        if let Some(set) = self.coefficients.iter().find(|set| set.beta.len() != n_predictors) {
            return Err(CalibrationError::InvalidParameter(
                "beta".to_string(),
                format!("{} values for the {} predictor", n_predictors, self.predictor),
                set.beta.len().to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json(json_str: &str) -> Result<Self, CalibrationError> {
        let coefficients = serde_json::from_str::<Self>(json_str)
            .map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        coefficients
            .validate()
            .map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        Ok(coefficients)
    }

    /// Load coefficients from a path to a json object.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let json_str = fs::read_to_string(path).map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_params_mean() {
        let c = CoefficientSet::from_params(&[1.0, -0.5, 2.0, 3.0], PredictorOfMean::Mean);
        assert_eq!(c.alpha, 1.0);
        assert_eq!(c.beta, vec![-0.5]);
        assert_eq!(c.location(&[4.0]), -1.0);
        assert_eq!(c.scale(1.0), 13.0_f64.sqrt());
    }

    #[test]
    fn test_from_params_realizations_squares_betas() {
        let c = CoefficientSet::from_params(&[0.0, -0.5, 0.5, 0.0, 1.0], PredictorOfMean::Realizations);
        assert_eq!(c.beta, vec![0.25, 0.25]);
        assert_eq!(c.location(&[2.0, 6.0]), 2.0);
        assert_eq!(c.scale(4.0), 2.0);
    }

    #[test]
    fn test_identity() {
        let c = CoefficientSet::identity(4, PredictorOfMean::Realizations);
        assert_eq!(c.location(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        let c = CoefficientSet::identity(1, PredictorOfMean::Mean);
        assert_eq!(c.location(&[7.0]), 7.0);
    }

    #[test]
    fn test_coefficients_io() {
        let coefficients = EmosCoefficients {
            distribution: Distribution::Gaussian,
            predictor: PredictorOfMean::Mean,
            units: "K".to_string(),
            forecast_period: Some(14_400),
            n_realizations: 3,
            coefficients: vec![CoefficientSet::identity(1, PredictorOfMean::Mean)],
            crps: vec![Some(0.5)],
            iterations: vec![10],
            converged: vec![true],
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("coefficients.json");
        coefficients.save(&path).unwrap();
        let loaded = EmosCoefficients::load(&path).unwrap();
        assert_eq!(loaded.coefficients, coefficients.coefficients);
        assert!(!loaded.is_point_by_point());
        assert_eq!(loaded.for_point(5).beta, vec![1.0]);
    }

    #[test]
    fn test_beta_length_must_match_predictor() {
        let mut coefficients = EmosCoefficients {
            distribution: Distribution::Gaussian,
            predictor: PredictorOfMean::Realizations,
            units: "K".to_string(),
            forecast_period: None,
            n_realizations: 3,
            coefficients: vec![CoefficientSet::identity(3, PredictorOfMean::Realizations)],
            crps: vec![Some(0.5)],
            iterations: vec![10],
            converged: vec![true],
        };
        assert!(coefficients.validate().is_ok());
        let json = coefficients.json_dump().unwrap();
        assert!(EmosCoefficients::from_json(&json).is_ok());

        coefficients.coefficients[0].beta.pop();
        assert!(matches!(
            coefficients.validate(),
            Err(CalibrationError::InvalidParameter(..))
        ));
        let json = coefficients.json_dump().unwrap();
        assert!(matches!(
            EmosCoefficients::from_json(&json),
            Err(CalibrationError::UnableToRead(_))
        ));

        coefficients.predictor = PredictorOfMean::Mean;
        coefficients.coefficients[0].beta = vec![1.0];
        assert!(coefficients.validate().is_ok());
        coefficients.coefficients.clear();
        assert!(coefficients.validate().is_err());
    }
}
