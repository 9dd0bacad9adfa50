//! Posterior mode and Laplace approximation for a heteroscedastic Gaussian
//! regression with independent Normal(0, prior_sd^2) coefficient priors.
//!
//! Model: `y_i ~ N(x_i' beta, sigma_i^2)`, `log sigma_i = z_i' gamma`.
//!
//! The mode is found by alternating an exact weighted least-squares update
//! for `beta` (conditional on `gamma`) with a damped Fisher scoring step for
//! `gamma`. The posterior covariance is approximated by the inverse expected
//! information at the mode, which is block diagonal in `(beta, gamma)`.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::config::FitControl;
use crate::error::PpaError;
use crate::math::linalg::{max_abs, safe_cholesky, weighted_cross, weighted_gram};
use crate::model::{FitOutcome, GroupProblem, RegressionFitter};

const MAX_GAMMA_STEP: f64 = 5.0;
const MAX_HALVINGS: usize = 30;
/// `-E[log chi2_1] / 2`, recentres log absolute residuals on log sigma.
const LOG_ABS_RESIDUAL_BIAS: f64 = 0.635;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeteroscedasticGaussian;

impl RegressionFitter for HeteroscedasticGaussian {
    fn fit(&self, problem: &GroupProblem, control: &FitControl) -> Result<FitOutcome, PpaError> {
        let GroupProblem { y, x, z, .. } = problem;
        let n = y.len();
        if x.nrows() != n || z.nrows() != n {
            return Err(PpaError::Column(format!(
                "design rows ({}, {}) do not match {} observations",
                x.nrows(),
                z.nrows(),
                n
            )));
        }
        let p = x.ncols();
        let q = z.ncols();
        let lambda = 1.0 / (problem.prior_sd * problem.prior_sd);

        let ones = DVector::from_element(n, 1.0);
        let mut beta = solve_ridge(x, &ones, y, lambda, 0)?;
        let resid = y - x * &beta;
        let log_abs = resid.map(|r| 0.5 * (r * r + 1e-12).ln() + LOG_ABS_RESIDUAL_BIAS);
        let mut gamma = solve_ridge(z, &ones, &log_abs, lambda, 0)?;

        let gamma_info = {
            let mut info = z.transpose() * z * 2.0;
            for i in 0..q {
                info[(i, i)] += lambda;
            }
            info
        };
        let gamma_chol = safe_cholesky(&gamma_info)
            .ok_or_else(|| PpaError::convergence(0, "singular scale information matrix"))?;

        let mut converged_at = None;
        for iter in 1..=control.max_iterations {
            if control.expired() {
                return Err(PpaError::convergence(iter - 1, "fit deadline expired"));
            }

            let weights = precision(z, &gamma);
            let beta_new = solve_ridge(x, &weights, y, lambda, iter)?;
            let resid = y - x * &beta_new;

            let scaled = resid.component_mul(&resid).component_mul(&weights).add_scalar(-1.0);
            let score = z.transpose() * scaled - &gamma * lambda;
            let mut step = gamma_chol.solve(&score);
            let largest = max_abs(&step);
            if largest > MAX_GAMMA_STEP {
                step *= MAX_GAMMA_STEP / largest;
            }

            let base = log_posterior(y, x, z, &beta_new, &gamma, lambda);
            let mut t = 1.0;
            let mut gamma_new = &gamma + &step;
            for _ in 0..MAX_HALVINGS {
                let candidate = log_posterior(y, x, z, &beta_new, &gamma_new, lambda);
                if candidate.is_finite() && candidate >= base - 1e-12 * base.abs().max(1.0) {
                    break;
                }
                t *= 0.5;
                gamma_new = &gamma + &step * t;
            }

            if beta_new.iter().chain(gamma_new.iter()).any(|v| !v.is_finite()) {
                return Err(PpaError::convergence(iter, "non-finite coefficient update"));
            }

            let delta = max_abs(&(&beta_new - &beta)).max(max_abs(&(&gamma_new - &gamma)));
            let scale = 1.0 + max_abs(&beta_new).max(max_abs(&gamma_new));
            beta = beta_new;
            gamma = gamma_new;
            debug!(iteration = iter, delta, "heteroscedastic_update");
            if delta < control.tolerance * scale {
                converged_at = Some(iter);
                break;
            }
        }

        let iterations = converged_at.ok_or_else(|| {
            PpaError::convergence(
                control.max_iterations,
                "coefficient updates did not settle within tolerance",
            )
        })?;

        let weights = precision(z, &gamma);
        let mut beta_info = weighted_gram(x, &weights);
        for i in 0..p {
            beta_info[(i, i)] += lambda;
        }
        let beta_cov = safe_cholesky(&beta_info)
            .ok_or_else(|| PpaError::convergence(iterations, "singular mean information matrix"))?
            .inverse();
        let gamma_cov = gamma_chol.inverse();

        let std_errors = beta_cov
            .diagonal()
            .iter()
            .chain(gamma_cov.diagonal().iter())
            .map(|v| v.max(0.0).sqrt())
            .collect();
        let estimates = beta.iter().chain(gamma.iter()).copied().collect();

        Ok(FitOutcome {
            estimates,
            std_errors,
            iterations,
            log_likelihood: log_posterior(y, x, z, &beta, &gamma, lambda),
        })
    }
}

/// `exp(-2 z_i' gamma)`, the per-observation precision.
fn precision(z: &DMatrix<f64>, gamma: &DVector<f64>) -> DVector<f64> {
    (z * gamma).map(|eta| (-2.0 * eta).exp())
}

fn solve_ridge(
    x: &DMatrix<f64>,
    w: &DVector<f64>,
    y: &DVector<f64>,
    lambda: f64,
    iteration: usize,
) -> Result<DVector<f64>, PpaError> {
    let mut gram = weighted_gram(x, w);
    for i in 0..x.ncols() {
        gram[(i, i)] += lambda;
    }
    let rhs = weighted_cross(x, w, y);
    let chol = safe_cholesky(&gram)
        .ok_or_else(|| PpaError::convergence(iteration, "singular weighted design matrix"))?;
    Ok(chol.solve(&rhs))
}

fn log_posterior(
    y: &DVector<f64>,
    x: &DMatrix<f64>,
    z: &DMatrix<f64>,
    beta: &DVector<f64>,
    gamma: &DVector<f64>,
    lambda: f64,
) -> f64 {
    let resid = y - x * beta;
    let eta = z * gamma;
    let mut lp = 0.0;
    for (r, e) in resid.iter().zip(eta.iter()) {
        lp += -e - 0.5 * r * r * (-2.0 * e).exp() - 0.5 * (2.0 * PI).ln();
    }
    lp - 0.5 * lambda * (beta.norm_squared() + gamma.norm_squared())
}
