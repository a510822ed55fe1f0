//! Estimate
//!
//! Estimation of EMOS coefficients from historic forecasts and the truths
//! valid at the same times, by minimising the CRPS.
use crate::coefficients::{CoefficientSet, EmosCoefficients};
use crate::config::CalibrationConfig;
use crate::constants::CRPS_CHANGE_WARNING_THRESHOLD;
use crate::cube::Cube;
use crate::distribution::PredictorOfMean;
use crate::errors::CalibrationError;
use crate::objective::{crps_objective, CrpsObjective, TrainingSet};
use crate::optimizer::{Minimiser, NelderMead, OptimizeResult};
use crate::regression::{compute_initial_guess, default_initial_guess};
use crate::utils::{fmt_vec_output, mean, variance};
use hashbrown::HashMap;
use log::{debug, info, warn};
use rayon::prelude::*;

/// Estimates EMOS coefficients for a configuration.
pub struct EstimateCoefficients {
    pub config: CalibrationConfig,
}

/// Coefficients for one grid point, with the initial CRPS and minimisation
/// result when the point had training samples.
type PointFit = (CoefficientSet, Option<(f64, OptimizeResult)>);

/// A historic forecast paired with the truth at its validity time.
struct ForecastTruthPair<'a> {
    forecast: &'a Cube,
    truth: &'a Cube,
}

impl EstimateCoefficients {
    pub fn new(config: CalibrationConfig) -> Result<Self, CalibrationError> {
        config.validate()?;
        Ok(EstimateCoefficients { config })
    }

    /// Estimate coefficients from historic forecasts and truths.
    ///
    /// Cubes are converted into the calibration units before fitting.
    pub fn process(
        &self,
        historic_forecasts: &[Cube],
        truths: &[Cube],
    ) -> Result<EmosCoefficients, CalibrationError> {
        if historic_forecasts.is_empty() {
            return Err(CalibrationError::InvalidCube("no historic forecasts provided".to_string()));
        }
        if truths.is_empty() {
            return Err(CalibrationError::InvalidCube("no truths provided".to_string()));
        }
        let forecasts = self.to_calibration_units(historic_forecasts)?;
        let truths = self.to_calibration_units(truths)?;
        let n_realizations = check_historic_forecasts(&forecasts, self.config.predictor)?;
        check_truths(&forecasts[0], &truths)?;

        let pairs = match_forecasts_to_truths(&forecasts, &truths)?;
        info!(
            "Estimating {} {} coefficients from {} forecast/truth pairs.",
            self.config.distribution,
            self.config.predictor,
            pairs.len()
        );

        let objective = crps_objective(&self.config.distribution);
        let n_predictors = match self.config.predictor {
            PredictorOfMean::Mean => 1,
            PredictorOfMean::Realizations => n_realizations,
        };

        let results: Vec<(CoefficientSet, Option<OptimizeResult>)> = if self.config.point_by_point {
            let training_sets = self.point_training_sets(&pairs, n_predictors);
            let fits: Vec<PointFit> = training_sets
                .par_iter()
                .map(|data| {
                    if data.is_empty() {
                        let guess = default_initial_guess(self.config.predictor, n_predictors);
                        return (CoefficientSet::from_params(&guess, self.config.predictor), None);
                    }
                    let initial_guess =
                        compute_initial_guess(data, self.config.predictor, self.config.use_default_initial_guess);
                    let initial_crps = objective.evaluate(&initial_guess, data, self.config.predictor);
                    let (coefficients, result) = self.minimise(data, objective.as_ref(), &initial_guess);
                    (coefficients, Some((initial_crps, result)))
                })
                .collect();
            self.report_points(&fits);
            fits.into_iter()
                .map(|(coefficients, fit)| (coefficients, fit.map(|(_, result)| result)))
                .collect()
        } else {
            let data = self.domain_training_set(&pairs, n_predictors);
            if data.is_empty() {
                return Err(CalibrationError::InvalidCube(
                    "no valid forecast/truth samples in the training data".to_string(),
                ));
            }
            let initial = compute_initial_guess(&data, self.config.predictor, self.config.use_default_initial_guess);
            info!(
                "CRPS of the initial guess: {:.6}",
                objective.evaluate(&initial, &data, self.config.predictor)
            );
            let (coefficients, result) = self.minimise(&data, objective.as_ref(), &initial);
            self.report(&result);
            info!(
                "Estimated coefficients: alpha {:.4}, beta [{}], gamma {:.4}, delta {:.4}",
                coefficients.alpha,
                fmt_vec_output(&coefficients.beta),
                coefficients.gamma,
                coefficients.delta
            );
            vec![(coefficients, Some(result))]
        };

        let mut emos = EmosCoefficients {
            distribution: self.config.distribution,
            predictor: self.config.predictor,
            units: self.config.units.clone(),
            forecast_period: forecasts[0].forecast_period(),
            n_realizations,
            coefficients: Vec::with_capacity(results.len()),
            crps: Vec::with_capacity(results.len()),
            iterations: Vec::with_capacity(results.len()),
            converged: Vec::with_capacity(results.len()),
        };
        for (coefficients, result) in results {
            emos.coefficients.push(coefficients);
            match result {
                Some(r) => {
                    emos.crps.push(Some(r.fun));
                    emos.iterations.push(r.iterations);
                    emos.converged.push(r.converged);
                }
                None => {
                    emos.crps.push(None);
                    emos.iterations.push(0);
                    emos.converged.push(false);
                }
            }
        }
        Ok(emos)
    }

    fn to_calibration_units(&self, cubes: &[Cube]) -> Result<Vec<Cube>, CalibrationError> {
        cubes
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.convert_units(&self.config.units)?;
                Ok(c)
            })
            .collect()
    }

    fn minimise(
        &self,
        data: &TrainingSet,
        objective: &dyn CrpsObjective,
        initial_guess: &[f64],
    ) -> (CoefficientSet, OptimizeResult) {
        let predictor = self.config.predictor;
        let minimiser = NelderMead::new(self.config.max_iterations, self.config.tolerance);
        let result = minimiser.minimize(|params| objective.evaluate(params, data, predictor), initial_guess);
        (CoefficientSet::from_params(&result.x, predictor), result)
    }

    fn report(&self, result: &OptimizeResult) {
        info!(
            "Minimisation finished after {} iterations ({} evaluations) with CRPS {:.6}.",
            result.iterations, result.evaluations, result.fun
        );
        if !result.converged {
            warn!(
                "Minimisation did not result in convergence after {} iterations.",
                self.config.max_iterations
            );
        }
        if let Some(change) = large_final_change(result) {
            warn!(
                "The final iteration resulted in a percentage change of {:.2}% which is greater than \
                 the accepted threshold of {}%.",
                change, CRPS_CHANGE_WARNING_THRESHOLD
            );
        }
    }

    /// Summarise point-by-point minimisation over the grid points that had samples.
    fn report_points(&self, fits: &[PointFit]) {
        let fitted: Vec<&(f64, OptimizeResult)> = fits.iter().filter_map(|(_, fit)| fit.as_ref()).collect();
        let n_points = fits.len();
        if fitted.len() < n_points {
            warn!(
                "No valid training samples at {} of {} grid points, using the default initial guess there.",
                n_points - fitted.len(),
                n_points
            );
        }
        if fitted.is_empty() {
            return;
        }
        let n_fitted = fitted.len() as f64;
        info!(
            "Mean CRPS over {} grid points: {:.6} for the initial guess, {:.6} after minimisation.",
            fitted.len(),
            fitted.iter().map(|(initial, _)| initial).sum::<f64>() / n_fitted,
            fitted.iter().map(|(_, result)| result.fun).sum::<f64>() / n_fitted
        );
        let n_unconverged = fitted.iter().filter(|(_, result)| !result.converged).count();
        if n_unconverged > 0 {
            warn!(
                "Minimisation did not result in convergence after {} iterations at {} of {} grid points.",
                self.config.max_iterations, n_unconverged, n_points
            );
        }
        let n_large_change = fitted
            .iter()
            .filter(|(_, result)| large_final_change(result).is_some())
            .count();
        if n_large_change > 0 {
            warn!(
                "The final iteration resulted in a percentage change greater than the accepted threshold of {}% \
                 at {} of {} grid points.",
                CRPS_CHANGE_WARNING_THRESHOLD, n_large_change, n_points
            );
        }
    }

    fn domain_training_set(&self, pairs: &[ForecastTruthPair], n_predictors: usize) -> TrainingSet {
        let mut data = TrainingSet::new(n_predictors);
        let mut n_skipped = 0;
        for pair in pairs {
            for p in 0..pair.forecast.n_points() {
                if !self.push_sample(&mut data, pair, p) {
                    n_skipped += 1;
                }
            }
        }
        if n_skipped > 0 {
            debug!("Skipped {} samples containing missing values.", n_skipped);
        }
        data
    }

    fn point_training_sets(&self, pairs: &[ForecastTruthPair], n_predictors: usize) -> Vec<TrainingSet> {
        let n_points = pairs[0].forecast.n_points();
        let mut sets = vec![TrainingSet::new(n_predictors); n_points];
        for pair in pairs {
            for (p, data) in sets.iter_mut().enumerate() {
                self.push_sample(data, pair, p);
            }
        }
        sets
    }

    fn push_sample(&self, data: &mut TrainingSet, pair: &ForecastTruthPair, p: usize) -> bool {
        let members = pair.forecast.point_values(p);
        let truth = f64::from(pair.truth.data[p]);
        let var = variance(&members);
        match self.config.predictor {
            PredictorOfMean::Mean => data.push(&[mean(&members)], var, truth),
            PredictorOfMean::Realizations => data.push(&members, var, truth),
        }
    }
}

/// Percentage change of the final iteration, when it exceeds the warning threshold.
fn large_final_change(result: &OptimizeResult) -> Option<f64> {
    result
        .final_percentage_change()
        .filter(|change| *change > CRPS_CHANGE_WARNING_THRESHOLD)
}

/// Check historic forecasts share a grid and lead time, returning the number
/// of realizations in the first one.
///
/// Every forecast needs at least 2 realizations. The realizations predictor
/// also needs the same number in each, one coefficient per realization.
fn check_historic_forecasts(forecasts: &[Cube], predictor: PredictorOfMean) -> Result<usize, CalibrationError> {
    let first = &forecasts[0];
    let n_realizations = first.n_realizations();
    for cube in forecasts {
        if cube.realization.is_none() || cube.n_realizations() < 2 {
            return Err(CalibrationError::InvalidCube(format!(
                "historic forecasts need at least 2 realizations, {} found",
                cube.n_realizations()
            )));
        }
    }
    for cube in &forecasts[1..] {
        if !cube.spatial_coords_match(first) {
            return Err(CalibrationError::MismatchedGrids(
                "historic forecasts are not all on the same grid".to_string(),
            ));
        }
        if cube.forecast_period() != first.forecast_period() {
            return Err(CalibrationError::InvalidParameter(
                "forecast_period".to_string(),
                format!("{:?} for every historic forecast", first.forecast_period()),
                format!("{:?}", cube.forecast_period()),
            ));
        }
        if predictor == PredictorOfMean::Realizations && cube.n_realizations() != n_realizations {
            return Err(CalibrationError::InvalidParameter(
                "realization".to_string(),
                format!("{} realizations in every historic forecast", n_realizations),
                cube.n_realizations().to_string(),
            ));
        }
    }
    Ok(n_realizations)
}

fn check_truths(forecast: &Cube, truths: &[Cube]) -> Result<(), CalibrationError> {
    for truth in truths {
        if truth.n_realizations() != 1 {
            return Err(CalibrationError::InvalidCube(format!(
                "truth valid at {} has {} realizations, expected a single field",
                truth.time,
                truth.n_realizations()
            )));
        }
        if !truth.spatial_coords_match(forecast) {
            return Err(CalibrationError::MismatchedGrids(format!(
                "truth valid at {} is not on the historic forecast grid",
                truth.time
            )));
        }
    }
    Ok(())
}

/// Pair each historic forecast with the truth at its validity time, in time order.
fn match_forecasts_to_truths<'a>(
    forecasts: &'a [Cube],
    truths: &'a [Cube],
) -> Result<Vec<ForecastTruthPair<'a>>, CalibrationError> {
    let mut truth_by_time: HashMap<i64, &Cube> = HashMap::with_capacity(truths.len());
    for truth in truths {
        if truth_by_time.insert(truth.time, truth).is_some() {
            warn!("More than one truth is valid at {}, using the last one loaded.", truth.time);
        }
    }
    let mut ordered: Vec<&Cube> = forecasts.iter().collect();
    ordered.sort_by_key(|c| c.time);

    let mut pairs = Vec::with_capacity(ordered.len());
    for forecast in ordered {
        match truth_by_time.get(&forecast.time) {
            Some(&truth) => pairs.push(ForecastTruthPair { forecast, truth }),
            None => warn!(
                "No truth found for the historic forecast valid at {}, skipping it.",
                forecast.time
            ),
        }
    }
    if pairs.is_empty() {
        return Err(CalibrationError::NoMatchingTruth);
    }
    Ok(pairs)
}
