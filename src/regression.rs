//! Regression
//!
//! Initial guesses for the EMOS minimisation, either fixed defaults or
//! estimated with a linear model of the truth on the predictors.
use crate::distribution::PredictorOfMean;
use crate::objective::TrainingSet;
use log::{debug, warn};

const PIVOT_EPS: f64 = 1e-12;

/// Default starting point `[alpha, beta.., gamma, delta]`.
///
/// For the realizations predictor each beta is `sqrt(1 / n)`, so the squared
/// weights sum to one.
pub fn default_initial_guess(predictor: PredictorOfMean, n_predictors: usize) -> Vec<f64> {
    let mut guess = vec![0.0];
    match predictor {
        PredictorOfMean::Mean => guess.push(1.0),
        PredictorOfMean::Realizations => {
            guess.extend(std::iter::repeat((1.0 / n_predictors as f64).sqrt()).take(n_predictors))
        }
    }
    guess.extend([0.0, 1.0]);
    guess
}

/// Simple linear regression of `y` on `x`, returning `(intercept, slope)`.
///
/// Returns `None` when `x` has no variance.
pub fn linregress(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len() as f64;
    if x.len() < 2 || x.len() != y.len() {
        return None;
    }
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        sxy += (xi - x_mean) * (yi - y_mean);
        sxx += (xi - x_mean).powi(2);
    }
    if sxx <= PIVOT_EPS * n {
        return None;
    }
    let slope = sxy / sxx;
    Some((y_mean - slope * x_mean, slope))
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` if the system is singular.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .enumerate()
        .map(|(i, row)| row[i].abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    for col in 0..n {
        let pivot = (col..n).max_by(|i, j| a[*i][col].abs().total_cmp(&a[*j][col].abs()))?;
        if a[pivot][col].abs() <= PIVOT_EPS * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        let pivot_row = a[col].clone();
        let pivot_b = b[col];
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * pivot_b;
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let s: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - s) / a[row][row];
    }
    Some(x)
}

/// Ordinary least squares with an intercept, returning `[intercept, b_1, .., b_k]`.
pub fn ordinary_least_squares(data: &TrainingSet) -> Option<Vec<f64>> {
    let k = data.n_predictors + 1;
    if data.len() < k {
        return None;
    }
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut row = vec![1.0; k];
    for i in 0..data.len() {
        row[1..].copy_from_slice(data.sample_predictors(i));
        for a in 0..k {
            xty[a] += row[a] * data.truth[i];
            for b in a..k {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }
    for a in 0..k {
        for b in 0..a {
            xtx[a][b] = xtx[b][a];
        }
    }
    solve_linear_system(xtx, xty)
}

/// Starting point for the minimisation.
///
/// Unless defaults are requested the location coefficients come from a linear
/// model, falling back to the defaults if the model can not be fitted.
pub fn compute_initial_guess(data: &TrainingSet, predictor: PredictorOfMean, use_default: bool) -> Vec<f64> {
    let default = default_initial_guess(predictor, data.n_predictors);
    if use_default {
        return default;
    }
    let estimate = match predictor {
        PredictorOfMean::Mean => {
            linregress(&data.predictor_means(), &data.truth).map(|(intercept, slope)| vec![intercept, slope])
        }
        PredictorOfMean::Realizations => ordinary_least_squares(data).map(|params| {
            let mut guess = vec![params[0]];
            guess.extend(params[1..].iter().map(|b| b.abs().sqrt()));
            guess
        }),
    };
    match estimate {
        Some(mut guess) => {
            guess.extend([0.0, 1.0]);
            debug!("initial guess from linear model: {:?}", guess);
            guess
        }
        None => {
            warn!("Unable to fit a linear model to the training data, using the default initial guess.");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn test_default_initial_guess() {
        assert_eq!(default_initial_guess(PredictorOfMean::Mean, 1), vec![0.0, 1.0, 0.0, 1.0]);
        let guess = default_initial_guess(PredictorOfMean::Realizations, 4);
        assert_eq!(guess, vec![0.0, 0.5, 0.5, 0.5, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_linregress() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 + 2.0 * v).collect();
        let (intercept, slope) = linregress(&x, &y).unwrap();
        assert!(is_close!(intercept, 0.5, abs_tol = 1e-12));
        assert!(is_close!(slope, 2.0, abs_tol = 1e-12));
        assert!(linregress(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }

    #[test]
    fn test_solve_linear_system() {
        let a = vec![vec![0.0, 2.0, 1.0], vec![1.0, 1.0, 0.0], vec![3.0, 0.0, 1.0]];
        let b = vec![5.0, 3.0, 6.0];
        let x = solve_linear_system(a, b).unwrap();
        let expected = [1.4, 1.6, 1.8];
        for (xi, ei) in x.iter().zip(expected) {
            assert!(is_close!(*xi, ei, abs_tol = 1e-12));
        }
        assert!(solve_linear_system(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn test_ols_recovers_coefficients() {
        let mut data = TrainingSet::new(2);
        for i in 0..20 {
            let a = i as f64;
            let b = ((i * 7) % 5) as f64;
            data.push(&[a, b], 1.0, 1.0 + 0.25 * a + 0.75 * b);
        }
        let params = ordinary_least_squares(&data).unwrap();
        assert!(is_close!(params[0], 1.0, abs_tol = 1e-9));
        assert!(is_close!(params[1], 0.25, abs_tol = 1e-9));
        assert!(is_close!(params[2], 0.75, abs_tol = 1e-9));

        let guess = compute_initial_guess(&data, PredictorOfMean::Realizations, false);
        assert_eq!(guess.len(), 5);
        assert!(is_close!(guess[1], 0.5, abs_tol = 1e-9));
        assert_eq!(&guess[3..], &[0.0, 1.0]);
    }

    #[test]
    fn test_initial_guess_falls_back_to_default() {
        let mut data = TrainingSet::new(1);
        data.push(&[5.0], 1.0, 4.0);
        data.push(&[5.0], 1.0, 6.0);
        let guess = compute_initial_guess(&data, PredictorOfMean::Mean, false);
        assert_eq!(guess, vec![0.0, 1.0, 0.0, 1.0]);
    }
}
