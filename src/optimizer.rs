//! Optimizer
//!
//! Derivative-free minimisation of the CRPS with the Nelder-Mead simplex
//! method. Simplex construction, update coefficients and stopping rules follow
//! the SciPy implementation so coefficient estimates are comparable.
use crate::constants::{CONTRACTION, EXPANSION, NONZERO_DELTA, REFLECTION, SHRINK, ZERO_DELTA};
use log::debug;
use serde::{Deserialize, Serialize};

/// Outcome of a minimisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResult {
    /// Parameters at the best vertex found.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// Whether the tolerances were met before the iteration limit.
    pub converged: bool,
    /// Best objective value after each iteration.
    pub history: Vec<f64>,
}

impl OptimizeResult {
    /// Percentage change of the best value over the final iteration.
    pub fn final_percentage_change(&self) -> Option<f64> {
        let n = self.history.len();
        if n < 2 {
            return None;
        }
        let (prev, last) = (self.history[n - 2], self.history[n - 1]);
        if prev == 0.0 {
            return None;
        }
        Some(((last - prev) / prev).abs() * 100.0)
    }
}

// A minimiser searches for the parameters minimising an objective.
pub trait Minimiser {
    fn minimize<F>(&self, objective: F, x0: &[f64]) -> OptimizeResult
    where
        F: Fn(&[f64]) -> f64;
}

/// Nelder-Mead simplex minimiser.
#[derive(Debug, Clone)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Absolute tolerance on parameter changes.
    pub xatol: f64,
    /// Absolute tolerance on objective changes.
    pub fatol: f64,
}

impl NelderMead {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        NelderMead {
            max_iterations,
            xatol: tolerance,
            fatol: tolerance,
        }
    }

    fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
        let mut simplex = vec![x0.to_vec()];
        for k in 0..x0.len() {
            let mut y = x0.to_vec();
            if y[k] != 0.0 {
                y[k] *= 1.0 + NONZERO_DELTA;
            } else {
                y[k] = ZERO_DELTA;
            }
            simplex.push(y);
        }
        simplex
    }

    fn converged(&self, simplex: &[Vec<f64>], fsim: &[f64]) -> bool {
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        let f_spread = fsim[1..].iter().map(|f| (f - fsim[0]).abs()).fold(0.0_f64, f64::max);
        x_spread <= self.xatol && f_spread <= self.fatol
    }
}

fn combine(xbar: &[f64], worst: &[f64], coefficient: f64) -> Vec<f64> {
    // xbar + coefficient * (xbar - worst)
    xbar.iter()
        .zip(worst)
        .map(|(b, w)| (1.0 + coefficient) * b - coefficient * w)
        .collect()
}

fn sort_simplex(simplex: &mut Vec<Vec<f64>>, fsim: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..fsim.len()).collect();
    order.sort_by(|a, b| fsim[*a].total_cmp(&fsim[*b]));
    *simplex = order.iter().map(|i| simplex[*i].clone()).collect();
    *fsim = order.iter().map(|i| fsim[*i]).collect();
}

impl Minimiser for NelderMead {
    fn minimize<F>(&self, objective: F, x0: &[f64]) -> OptimizeResult
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = x0.len();
        let mut evaluations = 0;
        let mut f = |x: &[f64]| {
            evaluations += 1;
            let v = objective(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let mut simplex = Self::initial_simplex(x0);
        let mut fsim: Vec<f64> = simplex.iter().map(|x| f(x)).collect();
        sort_simplex(&mut simplex, &mut fsim);

        let mut history = vec![fsim[0]];
        let mut iterations = 1;
        let mut converged = false;

        while iterations < self.max_iterations {
            if self.converged(&simplex, &fsim) {
                converged = true;
                break;
            }

            let mut xbar = vec![0.0; n];
            for vertex in &simplex[..n] {
                xbar.iter_mut().zip(vertex).for_each(|(b, v)| *b += v / n as f64);
            }

            let xr = combine(&xbar, &simplex[n], REFLECTION);
            let fxr = f(&xr);
            let mut shrink = false;

            if fxr < fsim[0] {
                let xe = combine(&xbar, &simplex[n], REFLECTION * EXPANSION);
                let fxe = f(&xe);
                if fxe < fxr {
                    simplex[n] = xe;
                    fsim[n] = fxe;
                } else {
                    simplex[n] = xr;
                    fsim[n] = fxr;
                }
            } else if fxr < fsim[n - 1] {
                simplex[n] = xr;
                fsim[n] = fxr;
            } else if fxr < fsim[n] {
                let xc = combine(&xbar, &simplex[n], CONTRACTION * REFLECTION);
                let fxc = f(&xc);
                if fxc <= fxr {
                    simplex[n] = xc;
                    fsim[n] = fxc;
                } else {
                    shrink = true;
                }
            } else {
                let xcc = combine(&xbar, &simplex[n], -CONTRACTION);
                let fxcc = f(&xcc);
                if fxcc < fsim[n] {
                    simplex[n] = xcc;
                    fsim[n] = fxcc;
                } else {
                    shrink = true;
                }
            }

            if shrink {
                let best = simplex[0].clone();
                for j in 1..=n {
                    simplex[j] = best
                        .iter()
                        .zip(&simplex[j])
                        .map(|(b, v)| b + SHRINK * (v - b))
                        .collect();
                    fsim[j] = f(&simplex[j]);
                }
            }

            iterations += 1;
            sort_simplex(&mut simplex, &mut fsim);
            history.push(fsim[0]);
            if iterations % 100 == 0 {
                debug!("iteration {}, best objective {:.6}", iterations, fsim[0]);
            }
        }

        OptimizeResult {
            x: simplex[0].clone(),
            fun: fsim[0],
            iterations,
            evaluations,
            converged,
            history,
        }
    }
}
