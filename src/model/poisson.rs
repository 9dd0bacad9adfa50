use nalgebra::DVector;
use tracing::debug;

use crate::config::FitControl;
use crate::error::PpaError;
use crate::math::linalg::{safe_cholesky, weighted_cross, weighted_gram};
use crate::model::{FitOutcome, PointProcessFitter, QuadratureScheme};

const MAX_HALVINGS: usize = 30;

/// Log-link Poisson regression on a quadrature scheme, fitted by Newton
/// iterations with step halving. Standard errors come from the inverse
/// Fisher information at the optimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonQuadratureFitter;

impl PointProcessFitter for PoissonQuadratureFitter {
    fn fit(
        &self,
        scheme: &QuadratureScheme,
        control: &FitControl,
    ) -> Result<FitOutcome, PpaError> {
        let QuadratureScheme { x, y, w, .. } = scheme;
        if scheme.is_empty() {
            return Err(PpaError::InsufficientData {
                observations: 0,
                parameters: x.ncols(),
            });
        }
        if scheme.n_data == 0 {
            return Err(PpaError::convergence(
                0,
                "response pattern has no points; log intensity is unbounded below",
            ));
        }

        let p = x.ncols();
        let mut beta = DVector::<f64>::zeros(p);
        if let Some(intercept) = constant_column(x) {
            let events: f64 = w.component_mul(y).sum();
            beta[intercept] = (events / w.sum()).ln();
        }
        let mut loglik = log_likelihood(scheme, &beta);

        let mut converged_at = None;
        for iter in 1..=control.max_iterations {
            if control.expired() {
                return Err(PpaError::convergence(iter - 1, "fit deadline expired"));
            }

            let mu = (x * &beta).map(f64::exp);
            let score = weighted_cross(x, w, &(y - &mu));
            let info = weighted_gram(x, &w.component_mul(&mu));
            let chol = safe_cholesky(&info)
                .ok_or_else(|| PpaError::convergence(iter, "singular Fisher information"))?;
            let step = chol.solve(&score);

            let mut t = 1.0;
            let mut beta_new = &beta + &step;
            let mut loglik_new = log_likelihood(scheme, &beta_new);
            for _ in 0..MAX_HALVINGS {
                if loglik_new.is_finite() && loglik_new >= loglik - 1e-12 * loglik.abs().max(1.0)
                {
                    break;
                }
                t *= 0.5;
                beta_new = &beta + &step * t;
                loglik_new = log_likelihood(scheme, &beta_new);
            }
            if !loglik_new.is_finite() || beta_new.iter().any(|v| !v.is_finite()) {
                return Err(PpaError::convergence(iter, "non-finite log likelihood"));
            }

            let change = (loglik_new - loglik).abs() / (loglik_new.abs() + 0.1);
            beta = beta_new;
            loglik = loglik_new;
            debug!(iteration = iter, loglik, change, "poisson_update");
            if change < control.tolerance {
                converged_at = Some(iter);
                break;
            }
        }

        let iterations = converged_at.ok_or_else(|| {
            PpaError::convergence(
                control.max_iterations,
                "log likelihood did not settle within tolerance",
            )
        })?;

        let mu = (x * &beta).map(f64::exp);
        let info = weighted_gram(x, &w.component_mul(&mu));
        let cov = safe_cholesky(&info)
            .ok_or_else(|| PpaError::convergence(iterations, "singular Fisher information"))?
            .inverse();

        Ok(FitOutcome {
            estimates: beta.iter().copied().collect(),
            std_errors: cov.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect(),
            iterations,
            log_likelihood: loglik,
        })
    }
}

/// `sum w (y eta - exp(eta))`.
fn log_likelihood(scheme: &QuadratureScheme, beta: &DVector<f64>) -> f64 {
    let eta = &scheme.x * beta;
    eta.iter()
        .zip(scheme.y.iter().zip(scheme.w.iter()))
        .map(|(e, (yi, wi))| wi * (yi * e - e.exp()))
        .sum()
}

fn constant_column(x: &nalgebra::DMatrix<f64>) -> Option<usize> {
    (0..x.ncols()).find(|&c| x.column(c).iter().all(|v| *v == 1.0))
}
