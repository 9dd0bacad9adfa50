use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::PpaError;
use crate::model::quadrature::build_quadrature;
use crate::model::{
    Component, FittedModel, IntervalKind, ModelKind, PointProcessFitter, TableSnapshot,
    attach_intervals,
};
use crate::table::SampleCollection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPatternSpec {
    pub response_pattern: String,
    pub covariate_field: String,
    /// Factor columns broadcast to every quadrature point of a sample.
    pub factors: Vec<String>,
}

impl CrossPatternSpec {
    pub fn new(response_pattern: impl Into<String>, covariate_field: impl Into<String>) -> Self {
        Self {
            response_pattern: response_pattern.into(),
            covariate_field: covariate_field.into(),
            factors: Vec::new(),
        }
    }

    pub fn with_factors(mut self, factors: Vec<String>) -> Self {
        self.factors = factors;
        self
    }

    pub fn model_id(&self) -> String {
        let mut id = format!("cross__{}__{}", self.response_pattern, self.covariate_field);
        if !self.factors.is_empty() {
            id.push_str("__");
            id.push_str(&self.factors.join("+"));
        }
        id
    }
}

/// Pooled log-link point-process regression of the response pattern's
/// intensity on the covariate density field, across all samples.
pub fn fit_cross_pattern_model(
    collection: &SampleCollection,
    spec: &CrossPatternSpec,
    config: &AnalysisConfig,
    fitter: &dyn PointProcessFitter,
) -> Result<FittedModel, PpaError> {
    let scheme = build_quadrature(
        collection,
        &spec.response_pattern,
        &spec.covariate_field,
        &spec.factors,
        config.missing_policy,
    )?;
    if scheme.len() < scheme.terms.len() {
        return Err(PpaError::InsufficientData {
            observations: scheme.len(),
            parameters: scheme.terms.len(),
        });
    }
    info!(
        model = %spec.model_id(),
        samples = scheme.sample_ids.len(),
        data_points = scheme.n_data,
        dummy_points = scheme.n_dummy,
        "quadrature_ready"
    );

    let outcome = fitter.fit(&scheme, &config.fit_control())?;
    let terms: Vec<(String, Component)> = scheme
        .terms
        .iter()
        .map(|t| (t.clone(), Component::Mean))
        .collect();
    let coefficients = attach_intervals(&terms, &outcome, config.confidence_level)?;

    info!(
        model = %spec.model_id(),
        iterations = outcome.iterations,
        "cross_pattern_model_fitted"
    );

    let mut columns = vec![spec.response_pattern.clone(), spec.covariate_field.clone()];
    columns.extend(spec.factors.iter().cloned());
    Ok(FittedModel {
        id: spec.model_id(),
        kind: ModelKind::CrossPattern,
        response: spec.response_pattern.clone(),
        coefficients,
        interval: IntervalKind::Confidence,
        confidence_level: config.confidence_level,
        n_obs: scheme.len(),
        iterations: outcome.iterations,
        log_likelihood: outcome.log_likelihood,
        snapshot: TableSnapshot {
            sample_ids: scheme.sample_ids,
            columns,
        },
    })
}
