//! Objective
//!
//! Continuous Ranked Probability Score (CRPS) objectives minimised when
//! estimating EMOS coefficients, and the training samples they are evaluated on.
use crate::coefficients::CoefficientSet;
use crate::constants::{BAD_VALUE, CRPS_CHUNK_SIZE};
use crate::distribution::{Distribution, PredictorOfMean};
use crate::stats::{norm_cdf, norm_pdf, FRAC_1_SQRT_PI};
use rayon::prelude::*;
use std::f64::consts::SQRT_2;

/// Paired forecast and truth samples.
///
/// Predictors are stored sample-major: sample `i` owns
/// `predictors[i * n_predictors..(i + 1) * n_predictors]`.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub n_predictors: usize,
    pub predictors: Vec<f64>,
    pub variance: Vec<f64>,
    pub truth: Vec<f64>,
}

impl TrainingSet {
    pub fn new(n_predictors: usize) -> Self {
        TrainingSet {
            n_predictors,
            ..Default::default()
        }
    }

    /// Add a sample, returning `false` (and skipping it) if any value is NaN.
    pub fn push(&mut self, predictors: &[f64], variance: f64, truth: f64) -> bool {
        debug_assert_eq!(predictors.len(), self.n_predictors);
        if truth.is_nan() || variance.is_nan() || predictors.iter().any(|p| p.is_nan()) {
            return false;
        }
        self.predictors.extend_from_slice(predictors);
        self.variance.push(variance);
        self.truth.push(truth);
        true
    }

    pub fn len(&self) -> usize {
        self.truth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.truth.is_empty()
    }

    #[inline]
    pub fn sample_predictors(&self, i: usize) -> &[f64] {
        &self.predictors[i * self.n_predictors..(i + 1) * self.n_predictors]
    }

    /// Mean of each sample's predictors, the ensemble mean in realizations mode.
    pub fn predictor_means(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| {
                let p = self.sample_predictors(i);
                p.iter().sum::<f64>() / p.len() as f64
            })
            .collect()
    }
}

/// A CRPS objective for one predictive distribution.
pub trait CrpsObjective: Send + Sync {
    /// CRPS of a single truth value against the distribution with the given location and scale.
    fn sample_crps(&self, mu: f64, sigma: f64, y: f64) -> f64;

    /// Mean CRPS over the training set for a minimiser parameter vector.
    ///
    /// Chunks are summed in parallel and combined in a fixed order, so the
    /// result does not depend on the number of threads. Non-finite scores
    /// are replaced by `BAD_VALUE`.
    fn evaluate(&self, params: &[f64], data: &TrainingSet, predictor: PredictorOfMean) -> f64 {
        if data.is_empty() {
            return BAD_VALUE;
        }
        let coefficients = CoefficientSet::from_params(params, predictor);
        let partial: Vec<f64> = data
            .truth
            .par_chunks(CRPS_CHUNK_SIZE)
            .enumerate()
            .map(|(c, chunk)| {
                let start = c * CRPS_CHUNK_SIZE;
                chunk
                    .iter()
                    .enumerate()
                    .map(|(j, y)| {
                        let i = start + j;
                        let mu = coefficients.location(data.sample_predictors(i));
                        let sigma = coefficients.scale(data.variance[i]);
                        self.sample_crps(mu, sigma, *y)
                    })
                    .sum::<f64>()
            })
            .collect();
        let crps = partial.iter().sum::<f64>() / data.len() as f64;
        if crps.is_finite() {
            crps
        } else {
            BAD_VALUE
        }
    }
}

/// CRPS of a normal distribution.
#[derive(Default, Debug, Clone)]
pub struct GaussianCrps {}

impl CrpsObjective for GaussianCrps {
    #[inline]
    fn sample_crps(&self, mu: f64, sigma: f64, y: f64) -> f64 {
        let z = (y - mu) / sigma;
        sigma * (z * (2.0 * norm_cdf(z) - 1.0) + 2.0 * norm_pdf(z) - FRAC_1_SQRT_PI)
    }
}

/// CRPS of a normal distribution truncated below at zero
/// (Thorarinsdottir and Gneiting, 2010).
#[derive(Default, Debug, Clone)]
pub struct TruncatedGaussianCrps {}

impl CrpsObjective for TruncatedGaussianCrps {
    #[inline]
    fn sample_crps(&self, mu: f64, sigma: f64, y: f64) -> f64 {
        let z = (y - mu) / sigma;
        let p = norm_cdf(mu / sigma);
        sigma / (p * p)
            * (z * p * (2.0 * norm_cdf(z) + p - 2.0) + 2.0 * norm_pdf(z) * p
                - FRAC_1_SQRT_PI * norm_cdf(SQRT_2 * mu / sigma))
    }
}

/// Objective used for a distribution.
pub fn crps_objective(distribution: &Distribution) -> Box<dyn CrpsObjective> {
    match distribution {
        Distribution::Gaussian => Box::new(GaussianCrps::default()),
        Distribution::TruncatedGaussian => Box::new(TruncatedGaussianCrps::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn training_set() -> TrainingSet {
        let mut data = TrainingSet::new(1);
        for i in 0..100 {
            let x = 270.0 + (i % 17) as f64;
            data.push(&[x], 1.0, x + 1.0);
        }
        data
    }

    #[test]
    fn test_push_skips_nan() {
        let mut data = TrainingSet::new(2);
        assert!(data.push(&[1.0, 2.0], 0.25, 1.5));
        assert!(!data.push(&[1.0, f64::NAN], 0.25, 1.5));
        assert!(!data.push(&[1.0, 2.0], 0.25, f64::NAN));
        assert_eq!(data.len(), 1);
        assert_eq!(data.sample_predictors(0), &[1.0, 2.0]);
        assert_eq!(data.predictor_means(), vec![1.5]);
    }

    #[test]
    fn test_gaussian_crps_closed_form() {
        // For a standard normal and y = 0 the CRPS is (sqrt(2) - 1) / sqrt(pi).
        let crps = GaussianCrps::default().sample_crps(0.0, 1.0, 0.0);
        assert!(is_close!(crps, (SQRT_2 - 1.0) * FRAC_1_SQRT_PI, abs_tol = 1e-12));
        // CRPS tends to the absolute error as the spread shrinks.
        let crps = GaussianCrps::default().sample_crps(0.0, 1e-6, 3.0);
        assert!(is_close!(crps, 3.0, abs_tol = 1e-5));
    }

    #[test]
    fn test_truncated_matches_gaussian_far_from_bound() {
        let g = GaussianCrps::default().sample_crps(50.0, 2.0, 51.0);
        let t = TruncatedGaussianCrps::default().sample_crps(50.0, 2.0, 51.0);
        assert!(is_close!(g, t, abs_tol = 1e-10));
        assert!(TruncatedGaussianCrps::default().sample_crps(0.5, 1.0, 0.0) > 0.0);
    }

    #[test]
    fn test_evaluate_prefers_bias_correction() {
        let data = training_set();
        let objective = crps_objective(&Distribution::Gaussian);
        let raw = objective.evaluate(&[0.0, 1.0, 0.0, 1.0], &data, PredictorOfMean::Mean);
        let corrected = objective.evaluate(&[1.0, 1.0, 0.0, 1.0], &data, PredictorOfMean::Mean);
        assert!(corrected < raw);
    }

    #[test]
    fn test_evaluate_bad_value() {
        let data = training_set();
        let objective = crps_objective(&Distribution::Gaussian);
        // Zero spread with a non-zero error divides by zero.
        let crps = objective.evaluate(&[0.0, 1.0, 0.0, 0.0], &data, PredictorOfMean::Mean);
        assert_eq!(crps, BAD_VALUE);
        assert_eq!(
            objective.evaluate(&[0.0, 1.0, 0.0, 1.0], &TrainingSet::new(1), PredictorOfMean::Mean),
            BAD_VALUE
        );
    }
}
