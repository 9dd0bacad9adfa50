//! Fitted model artifacts and the numerical engine seams.
//!
//! The pipeline shapes data into a [`GroupProblem`] or a
//! [`QuadratureScheme`] and hands it to a [`RegressionFitter`] or
//! [`PointProcessFitter`]. Engines only return raw estimates and standard
//! errors; intervals and naming are attached here.

pub mod cache;
pub mod cross;
pub mod design;
pub mod group;
pub mod hetero;
pub mod poisson;
pub mod quadrature;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::FitControl;
use crate::error::PpaError;
use crate::math::stats::two_sided_z;

pub use cross::{CrossPatternSpec, fit_cross_pattern_model};
pub use group::{GroupModelSpec, GroupSummary, fit_group_model, summarize_groups};
pub use hetero::HeteroscedasticGaussian;
pub use poisson::PoissonQuadratureFitter;
pub use quadrature::QuadratureScheme;

pub const INTERCEPT: &str = "(Intercept)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Group,
    CrossPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Linear predictor of the mean (or log intensity).
    Mean,
    /// Linear predictor of the log residual scale.
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    Credible,
    Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub component: Component,
    pub estimate: f64,
    pub std_error: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Coefficient {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Multiplicative effect on intensity per unit covariate increase, with
    /// its interval. Meaningful for log-link coefficients.
    pub fn rate_ratio(&self) -> (f64, f64, f64) {
        (self.estimate.exp(), self.lower.exp(), self.upper.exp())
    }
}

/// Rows and columns a model was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub sample_ids: Vec<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub id: String,
    pub kind: ModelKind,
    pub response: String,
    pub coefficients: Vec<Coefficient>,
    pub interval: IntervalKind,
    pub confidence_level: f64,
    pub n_obs: usize,
    pub iterations: usize,
    pub log_likelihood: f64,
    pub snapshot: TableSnapshot,
}

impl FittedModel {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn component(&self, component: Component) -> impl Iterator<Item = &Coefficient> {
        self.coefficients
            .iter()
            .filter(move |c| c.component == component)
    }
}

/// Raw engine output; estimates are ordered like the problem's terms.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub estimates: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub iterations: usize,
    pub log_likelihood: f64,
}

/// Heteroscedastic Gaussian regression: `y ~ N(X beta, exp(Z gamma)^2)`.
#[derive(Debug, Clone)]
pub struct GroupProblem {
    pub y: DVector<f64>,
    pub x: DMatrix<f64>,
    pub z: DMatrix<f64>,
    pub mean_terms: Vec<String>,
    pub scale_terms: Vec<String>,
    pub prior_sd: f64,
}

impl GroupProblem {
    pub fn n_params(&self) -> usize {
        self.mean_terms.len() + self.scale_terms.len()
    }
}

pub trait RegressionFitter {
    /// Estimates are `beta` followed by `gamma`.
    fn fit(&self, problem: &GroupProblem, control: &FitControl) -> Result<FitOutcome, PpaError>;
}

pub trait PointProcessFitter {
    fn fit(&self, scheme: &QuadratureScheme, control: &FitControl)
    -> Result<FitOutcome, PpaError>;
}

pub(crate) fn attach_intervals(
    terms: &[(String, Component)],
    outcome: &FitOutcome,
    confidence_level: f64,
) -> Result<Vec<Coefficient>, PpaError> {
    if outcome.estimates.len() != terms.len() || outcome.std_errors.len() != terms.len() {
        return Err(PpaError::convergence(
            outcome.iterations,
            format!(
                "engine returned {} estimates and {} standard errors for {} terms",
                outcome.estimates.len(),
                outcome.std_errors.len(),
                terms.len()
            ),
        ));
    }
    let z = two_sided_z(confidence_level);
    terms
        .iter()
        .zip(outcome.estimates.iter().zip(outcome.std_errors.iter()))
        .map(|((name, component), (&estimate, &std_error))| {
            if !estimate.is_finite() || !std_error.is_finite() || std_error < 0.0 {
                return Err(PpaError::convergence(
                    outcome.iterations,
                    format!("non-finite estimate for term '{}'", name),
                ));
            }
            Ok(Coefficient {
                name: name.clone(),
                component: *component,
                estimate,
                std_error,
                lower: estimate - z * std_error,
                upper: estimate + z * std_error,
            })
        })
        .collect()
}
