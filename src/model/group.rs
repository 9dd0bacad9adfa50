use std::collections::HashSet;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::PpaError;
use crate::math::stats::{mean, median, sample_sd};
use crate::model::design::{build_design, complete_rows, factor_levels};
use crate::model::{
    Component, FittedModel, GroupProblem, INTERCEPT, IntervalKind, ModelKind, RegressionFitter,
    TableSnapshot, attach_intervals,
};
use crate::table::{ColumnKind, SampleCollection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupModelSpec {
    pub response: String,
    pub covariates: Vec<String>,
    pub variance_covariates: Vec<String>,
}

impl GroupModelSpec {
    pub fn new(
        response: impl Into<String>,
        covariates: Vec<String>,
        variance_covariates: Vec<String>,
    ) -> Self {
        Self {
            response: response.into(),
            covariates,
            variance_covariates,
        }
    }

    /// Stable identifier used as the model cache key.
    pub fn model_id(&self) -> String {
        let mut id = format!("group__{}", self.response);
        if !self.covariates.is_empty() {
            id.push_str("__");
            id.push_str(&self.covariates.join("+"));
        }
        if !self.variance_covariates.is_empty() {
            id.push_str("__sigma_");
            id.push_str(&self.variance_covariates.join("+"));
        }
        id
    }

    fn all_columns(&self) -> Vec<String> {
        let mut columns = vec![self.response.clone()];
        for c in self.covariates.iter().chain(self.variance_covariates.iter()) {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
        columns
    }
}

/// Fits `response ~ covariates` with `log sigma ~ variance_covariates`.
pub fn fit_group_model(
    table: &SampleCollection,
    spec: &GroupModelSpec,
    config: &AnalysisConfig,
    fitter: &dyn RegressionFitter,
) -> Result<FittedModel, PpaError> {
    match table.column_kind(&spec.response) {
        Some(ColumnKind::Scalar) => {}
        Some(kind) => {
            return Err(PpaError::Column(format!(
                "response '{}' is a {} column; expected scalar",
                spec.response, kind
            )));
        }
        None => {
            return Err(PpaError::Column(format!(
                "unknown response column '{}'",
                spec.response
            )));
        }
    }
    for column in spec.covariates.iter().chain(spec.variance_covariates.iter()) {
        if !table.has_column(column) {
            return Err(PpaError::Column(format!(
                "unknown covariate column '{}'",
                column
            )));
        }
    }
    if table.scalars(&spec.response)?.iter().all(Option::is_none) {
        return Err(PpaError::InsufficientData {
            observations: 0,
            parameters: 1 + spec.variance_covariates.len(),
        });
    }

    let columns = spec.all_columns();
    let (rows, dropped) = complete_rows(table, &columns, config.missing_policy)?;
    if !dropped.is_empty() {
        warn!(
            model = %spec.model_id(),
            dropped = dropped.len(),
            "rows with missing values dropped"
        );
    }

    let mean_design = build_design(table, &spec.covariates, &rows)?;
    let scale_design = build_design(table, &spec.variance_covariates, &rows)?;
    let parameters = mean_design.terms.len() + scale_design.terms.len();
    if rows.len() < parameters {
        return Err(PpaError::InsufficientData {
            observations: rows.len(),
            parameters,
        });
    }

    let response = table.scalars(&spec.response)?;
    let y = DVector::from_iterator(rows.len(), rows.iter().map(|&r| response[r].unwrap_or(f64::NAN)));
    let problem = GroupProblem {
        y,
        x: mean_design.matrix,
        z: scale_design.matrix,
        mean_terms: mean_design.terms,
        scale_terms: scale_design.terms,
        prior_sd: config.prior_sd,
    };

    let outcome = fitter.fit(&problem, &config.fit_control())?;
    let terms: Vec<(String, Component)> = problem
        .mean_terms
        .iter()
        .map(|t| (t.clone(), Component::Mean))
        .chain(
            problem
                .scale_terms
                .iter()
                .map(|t| (sigma_term(t), Component::Scale)),
        )
        .collect();
    let coefficients = attach_intervals(&terms, &outcome, config.confidence_level)?;

    info!(
        model = %spec.model_id(),
        observations = rows.len(),
        parameters,
        iterations = outcome.iterations,
        "group_model_fitted"
    );

    Ok(FittedModel {
        id: spec.model_id(),
        kind: ModelKind::Group,
        response: spec.response.clone(),
        coefficients,
        interval: IntervalKind::Credible,
        confidence_level: config.confidence_level,
        n_obs: rows.len(),
        iterations: outcome.iterations,
        log_likelihood: outcome.log_likelihood,
        snapshot: TableSnapshot {
            sample_ids: rows.iter().map(|&r| table.ids()[r].clone()).collect(),
            columns,
        },
    })
}

fn sigma_term(term: &str) -> String {
    format!("sigma:{}", term)
}

/// Posterior mean per row from the model's mean coefficients; `None` for rows
/// the model was not fitted on.
pub fn predict_group_means(
    model: &FittedModel,
    table: &SampleCollection,
) -> Result<Vec<Option<f64>>, PpaError> {
    let fitted_rows: HashSet<&str> = model
        .snapshot
        .sample_ids
        .iter()
        .map(String::as_str)
        .collect();
    let mut out = Vec::with_capacity(table.len());
    for (row, id) in table.ids().iter().enumerate() {
        if !fitted_rows.contains(id.as_str()) {
            out.push(None);
            continue;
        }
        let mut eta = 0.0;
        let mut complete = true;
        for coef in model.component(Component::Mean) {
            match term_value(table, &coef.name, row)? {
                Some(v) => eta += coef.estimate * v,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        out.push(complete.then_some(eta));
    }
    Ok(out)
}

fn term_value(table: &SampleCollection, term: &str, row: usize) -> Result<Option<f64>, PpaError> {
    if term == INTERCEPT {
        return Ok(Some(1.0));
    }
    if let Some((column, level)) = term.split_once('=') {
        if table.column_kind(column) == Some(ColumnKind::Factor) {
            return Ok(table.factors(column)?[row]
                .as_deref()
                .map(|v| if v == level { 1.0 } else { 0.0 }));
        }
    }
    Ok(table.scalars(term)?[row].filter(|v| v.is_finite()))
}

/// Descriptive statistics of a scalar column per level of a factor column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub covariate: String,
    pub level: String,
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub sd: f64,
}

pub fn summarize_groups(
    table: &SampleCollection,
    response: &str,
    covariate: &str,
) -> Result<Vec<GroupSummary>, PpaError> {
    let values = table.scalars(response)?;
    let levels = table.factors(covariate)?;
    let ordered = factor_levels(levels.iter().filter_map(|l| l.as_deref()));
    let mut out = Vec::with_capacity(ordered.len());
    for level in ordered {
        let mut observed: Vec<f64> = values
            .iter()
            .zip(levels.iter())
            .filter(|(_, l)| l.as_deref() == Some(level.as_str()))
            .filter_map(|(v, _)| *v)
            .filter(|v| v.is_finite())
            .collect();
        let m = mean(&observed);
        let sd = sample_sd(&observed);
        let n = observed.len();
        let med = median(&mut observed);
        out.push(GroupSummary {
            covariate: covariate.to_string(),
            level,
            n,
            mean: m,
            median: med,
            sd,
        });
    }
    Ok(out)
}
