//! Ensemble Copula Coupling
//!
//! Sampling of calibrated distributions at equally spaced percentiles, and
//! reordering of those samples to follow the rank structure of the raw
//! ensemble so spatial and temporal correlations survive calibration.
use crate::cube::Cube;
use crate::distribution::Distribution;
use crate::errors::CalibrationError;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Equally spaced percentiles `100 * k / (n + 1)` for `k = 1..=n`.
pub fn choose_set_of_percentiles(n: usize) -> Vec<f64> {
    (1..=n).map(|k| 100.0 * k as f64 / (n + 1) as f64).collect()
}

/// Values of the distribution at each percentile and grid point.
///
/// The result is percentile-major, `[percentile][point]`, matching the
/// realization-major layout of a cube.
pub fn generate_percentiles(
    location: &[f64],
    scale: &[f64],
    distribution: Distribution,
    percentiles: &[f64],
) -> Vec<f64> {
    let n_points = location.len();
    let per_point: Vec<Vec<f64>> = location
        .par_iter()
        .zip(scale.par_iter())
        .map(|(loc, sd)| {
            percentiles
                .iter()
                .map(|p| {
                    if loc.is_nan() || sd.is_nan() {
                        f64::NAN
                    } else {
                        distribution.ppf(p / 100.0, *loc, *sd)
                    }
                })
                .collect()
        })
        .collect();
    let mut values = vec![f64::NAN; percentiles.len() * n_points];
    for (p, point_values) in per_point.iter().enumerate() {
        for (k, v) in point_values.iter().enumerate() {
            values[k * n_points + p] = *v;
        }
    }
    values
}

/// Reorders calibrated percentiles into realizations.
pub struct EnsembleReordering {
    rng: StdRng,
}

impl EnsembleReordering {
    /// A reordering seeded with `random_seed`, or from entropy when `None`.
    pub fn new(random_seed: Option<u64>) -> Self {
        let rng = match random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        EnsembleReordering { rng }
    }

    /// Rank of each raw member at a point. Ties are broken by random numbers.
    fn rank_order(&mut self, members: &[f64]) -> Vec<usize> {
        let tie_breaker: Vec<f64> = members.iter().map(|_| self.rng.gen::<f64>()).collect();
        let mut order: Vec<usize> = (0..members.len()).collect();
        order.sort_by(|a, b| {
            members[*a]
                .total_cmp(&members[*b])
                .then(tie_breaker[*a].total_cmp(&tie_breaker[*b]))
        });
        order
    }

    /// Assign the calibrated `percentiles` (`[percentile][point]`) to the
    /// realizations of `raw_forecast` so they share its rank order.
    ///
    /// The random number generator is consumed in point order, one draw per
    /// member, so a fixed seed always gives the same output.
    pub fn process(&mut self, raw_forecast: &Cube, percentiles: &[f64]) -> Result<Vec<f64>, CalibrationError> {
        let n_members = raw_forecast.n_realizations();
        let n_points = raw_forecast.n_points();
        if percentiles.len() != n_members * n_points {
            return Err(CalibrationError::InvalidParameter(
                "percentiles".to_string(),
                format!("{} values ({} per point)", n_members * n_points, n_members),
                percentiles.len().to_string(),
            ));
        }
        let mut reordered = vec![f64::NAN; percentiles.len()];
        let mut n_missing = 0;
        for p in 0..n_points {
            let members = raw_forecast.point_values(p);
            let order = self.rank_order(&members);
            let mut calibrated: Vec<f64> = (0..n_members).map(|k| percentiles[k * n_points + p]).collect();
            if members.iter().any(|v| v.is_nan()) || calibrated.iter().any(|v| v.is_nan()) {
                n_missing += 1;
                continue;
            }
            calibrated.sort_by(|a, b| a.total_cmp(b));
            for (rank, member) in order.into_iter().enumerate() {
                reordered[member * n_points + p] = calibrated[rank];
            }
        }
        if n_missing > 0 {
            debug!("{} grid points with missing values left unset by reordering.", n_missing);
        }
        Ok(reordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::tests::ensemble_cube;
    use is_close::is_close;

    #[test]
    fn test_choose_set_of_percentiles() {
        assert_eq!(choose_set_of_percentiles(3), vec![25.0, 50.0, 75.0]);
        assert_eq!(choose_set_of_percentiles(1), vec![50.0]);
        assert!(choose_set_of_percentiles(0).is_empty());
    }

    #[test]
    fn test_generate_percentiles_layout() {
        let percentiles = choose_set_of_percentiles(3);
        let values = generate_percentiles(&[0.0, 10.0], &[1.0, 2.0], Distribution::Gaussian, &percentiles);
        assert_eq!(values.len(), 6);
        // Medians sit in the middle percentile row.
        assert!(is_close!(values[2], 0.0, abs_tol = 1e-9));
        assert!(is_close!(values[3], 10.0, abs_tol = 1e-9));
        assert!(values[0] < values[2] && values[2] < values[4]);
        assert!(is_close!(values[4], -values[0], abs_tol = 1e-9));
        assert!(is_close!(values[5] - 10.0, 2.0 * values[4], abs_tol = 1e-9));
    }

    #[test]
    fn test_generate_percentiles_truncated_and_missing() {
        let percentiles = choose_set_of_percentiles(5);
        let values = generate_percentiles(&[0.1, f64::NAN], &[2.0, 1.0], Distribution::TruncatedGaussian, &percentiles);
        for k in 0..5 {
            assert!(values[k * 2] >= 0.0);
            assert!(values[k * 2 + 1].is_nan());
        }
    }

    #[test]
    fn test_reorder_preserves_rank() {
        // Point 0 members: 3, 1, 2. Point 1 members: 5, 6, 4.
        let raw = ensemble_cube(vec![3.0, 5.0, 1.0, 6.0, 2.0, 4.0], 3, 0);
        let calibrated = vec![10.0, 40.0, 20.0, 50.0, 30.0, 60.0];
        let reordered = EnsembleReordering::new(Some(0)).process(&raw, &calibrated).unwrap();
        assert_eq!(reordered, vec![30.0, 50.0, 10.0, 60.0, 20.0, 40.0]);
    }

    #[test]
    fn test_reorder_ties_are_seeded() {
        let raw = ensemble_cube(vec![1.0; 8], 4, 0);
        let calibrated: Vec<f64> = (0..8).map(|v| v as f64).collect();
        let a = EnsembleReordering::new(Some(42)).process(&raw, &calibrated).unwrap();
        let b = EnsembleReordering::new(Some(42)).process(&raw, &calibrated).unwrap();
        assert_eq!(a, b);
        let mut point0: Vec<f64> = (0..4).map(|k| a[k * 2]).collect();
        point0.sort_by(|x, y| x.total_cmp(y));
        assert_eq!(point0, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_reorder_wrong_length() {
        let raw = ensemble_cube(vec![1.0, 2.0], 2, 0);
        assert!(EnsembleReordering::new(None).process(&raw, &[1.0]).is_err());
    }
}
