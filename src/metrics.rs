//! Metrics
//!
//! Verification scores used to report how calibration changed a forecast.
use crate::cube::Cube;
use crate::errors::CalibrationError;
use crate::objective::{CrpsObjective, GaussianCrps};

/// CRPS of a normal forecast with location `mu` and scale `sigma` for truth `y`.
pub fn crps_gaussian(mu: f64, sigma: f64, y: f64) -> f64 {
    GaussianCrps::default().sample_crps(mu, sigma, y)
}

/// Empirical CRPS of an ensemble, `mean|x_i - y| - mean|x_i - x_j| / 2`.
pub fn ensemble_crps(members: &[f64], y: f64) -> f64 {
    let m = members.len();
    if m == 0 {
        return f64::NAN;
    }
    let mut sorted = members.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let abs_error = sorted.iter().map(|x| (x - y).abs()).sum::<f64>() / m as f64;
    // Sum over all ordered pairs of |x_i - x_j| from the sorted members.
    let pair_sum: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * i as f64 - m as f64 + 1.0) * x)
        .sum::<f64>()
        * 2.0;
    abs_error - pair_sum / (2.0 * (m * m) as f64)
}

/// Mean ensemble CRPS over grid points where the forecast and truth are valid.
pub fn mean_ensemble_crps(forecast: &Cube, truth: &Cube) -> Result<f64, CalibrationError> {
    if !forecast.spatial_coords_match(truth) {
        return Err(CalibrationError::MismatchedGrids(format!(
            "{} and truth {}",
            forecast.name, truth.name
        )));
    }
    let (mut total, mut count) = (0.0, 0usize);
    for p in 0..forecast.n_points() {
        let members = forecast.point_values(p);
        let y = f64::from(truth.data[p]);
        if y.is_nan() || members.iter().any(|v| v.is_nan()) {
            continue;
        }
        total += ensemble_crps(&members, y);
        count += 1;
    }
    if count == 0 {
        return Ok(f64::NAN);
    }
    Ok(total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::tests::{ensemble_cube, truth_cube};
    use is_close::is_close;

    #[test]
    fn test_ensemble_crps_single_member_is_absolute_error() {
        assert_eq!(ensemble_crps(&[3.0], 1.0), 2.0);
    }

    #[test]
    fn test_ensemble_crps_brute_force() {
        let members = [1.0, 4.0, 2.5, 7.0];
        let y = 3.0;
        let m = members.len() as f64;
        let e1: f64 = members.iter().map(|x: &f64| (x - y).abs()).sum::<f64>() / m;
        let mut e2 = 0.0;
        for a in members {
            for b in members {
                e2 += (a - b).abs();
            }
        }
        let expected = e1 - e2 / (2.0 * m * m);
        assert!(is_close!(ensemble_crps(&members, y), expected, abs_tol = 1e-12));
    }

    #[test]
    fn test_crps_gaussian_penalises_bias() {
        assert!(crps_gaussian(0.0, 1.0, 0.0) < crps_gaussian(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_mean_ensemble_crps_skips_missing() {
        let forecast = ensemble_cube(vec![1.0, f32::NAN, 3.0, 5.0], 2, 0);
        let truth = truth_cube(vec![2.0, 0.0], 0);
        let crps = mean_ensemble_crps(&forecast, &truth).unwrap();
        assert!(is_close!(crps, ensemble_crps(&[1.0, 3.0], 2.0), abs_tol = 1e-12));
    }
}
