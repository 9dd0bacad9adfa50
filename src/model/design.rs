//! Treatment-contrast design matrices over sample collection columns.

use std::cmp::Ordering;

use nalgebra::DMatrix;

use crate::config::MissingPolicy;
use crate::error::PpaError;
use crate::model::INTERCEPT;
use crate::table::{ColumnKind, SampleCollection};

#[derive(Debug, Clone)]
pub struct Design {
    pub matrix: DMatrix<f64>,
    pub terms: Vec<String>,
}

/// Per-row encoding of one covariate.
#[derive(Debug, Clone)]
enum Encoded {
    Factor { column: String, levels: Vec<String> },
    Scalar { column: String },
}

/// Levels in natural order: numeric when every level parses as a number,
/// lexical otherwise. The first level is the reference.
pub fn factor_levels<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut levels: Vec<String> = Vec::new();
    for v in values {
        if !levels.iter().any(|l| l == v) {
            levels.push(v.to_string());
        }
    }
    let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.trim().parse::<f64>().ok()).collect();
    match numeric {
        Some(keys) => {
            let mut paired: Vec<(f64, String)> = keys.into_iter().zip(levels).collect();
            paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            paired.into_iter().map(|(_, l)| l).collect()
        }
        None => {
            levels.sort();
            levels
        }
    }
}

pub fn factor_term(column: &str, level: &str) -> String {
    format!("{}={}", column, level)
}

/// Rows with every listed column observed. Under `Reject` the first missing
/// cell is an error; under `DropRows` the IDs of dropped rows are returned.
pub fn complete_rows(
    table: &SampleCollection,
    columns: &[String],
    policy: MissingPolicy,
) -> Result<(Vec<usize>, Vec<String>), PpaError> {
    let mut keep = Vec::with_capacity(table.len());
    let mut dropped = Vec::new();
    for row in 0..table.len() {
        let mut missing: Option<&str> = None;
        for column in columns {
            let observed = match table.column_kind(column) {
                Some(ColumnKind::Scalar) => table.scalars(column)?[row].is_some_and(f64::is_finite),
                Some(ColumnKind::Factor) => table.factors(column)?[row].is_some(),
                Some(_) => true,
                None => return Err(PpaError::Column(format!("unknown column '{}'", column))),
            };
            if !observed {
                missing = Some(column);
                break;
            }
        }
        match (missing, policy) {
            (None, _) => keep.push(row),
            (Some(column), MissingPolicy::Reject) => {
                return Err(PpaError::MissingValue {
                    column: column.to_string(),
                    sample: table.ids()[row].clone(),
                });
            }
            (Some(_), MissingPolicy::DropRows) => dropped.push(table.ids()[row].clone()),
        }
    }
    Ok((keep, dropped))
}

/// Intercept plus one indicator per non-reference factor level and one
/// column per scalar covariate, over the selected rows.
pub fn build_design(
    table: &SampleCollection,
    covariates: &[String],
    rows: &[usize],
) -> Result<Design, PpaError> {
    let mut encoded = Vec::with_capacity(covariates.len());
    for column in covariates {
        match table.column_kind(column) {
            Some(ColumnKind::Factor) => {
                let values = table.factors(column)?;
                let levels = factor_levels(rows.iter().filter_map(|&r| values[r].as_deref()));
                encoded.push(Encoded::Factor {
                    column: column.clone(),
                    levels,
                });
            }
            Some(ColumnKind::Scalar) => encoded.push(Encoded::Scalar {
                column: column.clone(),
            }),
            Some(kind) => {
                return Err(PpaError::Column(format!(
                    "covariate '{}' is a {} column; expected factor or scalar",
                    column, kind
                )));
            }
            None => return Err(PpaError::Column(format!("unknown column '{}'", column))),
        }
    }

    let mut terms = vec![INTERCEPT.to_string()];
    for enc in &encoded {
        match enc {
            Encoded::Factor { column, levels } => {
                terms.extend(levels.iter().skip(1).map(|l| factor_term(column, l)));
            }
            Encoded::Scalar { column } => terms.push(column.clone()),
        }
    }

    let mut matrix = DMatrix::<f64>::zeros(rows.len(), terms.len());
    for (i, &row) in rows.iter().enumerate() {
        matrix[(i, 0)] = 1.0;
        let mut col = 1;
        for enc in &encoded {
            match enc {
                Encoded::Factor { column, levels } => {
                    let value = table.factors(column)?[row].as_deref();
                    for level in levels.iter().skip(1) {
                        if value == Some(level.as_str()) {
                            matrix[(i, col)] = 1.0;
                        }
                        col += 1;
                    }
                }
                Encoded::Scalar { column } => {
                    matrix[(i, col)] = table.scalars(column)?[row].unwrap_or(f64::NAN);
                    col += 1;
                }
            }
        }
    }

    Ok(Design { matrix, terms })
}
