//! Pooled Berman-Turner quadrature over every sample of a collection.
//!
//! Dummy points sit at the in-window cell centres of each sample's covariate
//! field grid; data points are the response pattern's points. Each
//! quadrature point gets the area of its grid cell divided by the number of
//! quadrature points sharing that cell. The Poisson log likelihood of the
//! pattern is then approximated by a weighted Poisson regression with
//! response `indicator / weight`.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::config::MissingPolicy;
use crate::error::PpaError;
use crate::model::INTERCEPT;
use crate::model::design::{factor_levels, factor_term};
use crate::table::SampleCollection;

#[derive(Debug, Clone)]
pub struct QuadratureScheme {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub w: DVector<f64>,
    pub terms: Vec<String>,
    pub n_data: usize,
    pub n_dummy: usize,
    pub sample_ids: Vec<String>,
}

impl QuadratureScheme {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Sum of quadrature weights, the pooled window area.
    pub fn total_weight(&self) -> f64 {
        self.w.sum()
    }
}

struct QuadPoint {
    covariate: f64,
    weight: f64,
    is_data: bool,
    row: usize,
}

/// Builds the pooled scheme. Rows with a missing factor value fail or are
/// skipped according to `missing_policy`.
pub fn build_quadrature(
    table: &SampleCollection,
    response_pattern: &str,
    covariate_field: &str,
    factors: &[String],
    missing_policy: MissingPolicy,
) -> Result<QuadratureScheme, PpaError> {
    let patterns = table.patterns(response_pattern)?;
    let fields = table.fields(covariate_field)?;
    let factor_values = factors
        .iter()
        .map(|f| table.factors(f))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(table.len());
    'rows: for row in 0..table.len() {
        for (name, values) in factors.iter().zip(factor_values.iter()) {
            if values[row].is_none() {
                match missing_policy {
                    MissingPolicy::Reject => {
                        return Err(PpaError::MissingValue {
                            column: name.clone(),
                            sample: table.ids()[row].clone(),
                        });
                    }
                    MissingPolicy::DropRows => continue 'rows,
                }
            }
        }
        rows.push(row);
    }

    let mut points: Vec<QuadPoint> = Vec::new();
    let mut n_data = 0usize;
    for &row in &rows {
        let sample = &table.ids()[row];
        let pattern = &patterns[row];
        let field = &fields[row];
        if pattern.window().is_degenerate() || field.in_window_cells() == 0 {
            return Err(PpaError::DegenerateWindow {
                sample: sample.clone(),
            });
        }

        let grid = *field.grid();
        if !grid.spans(&pattern.window().bounds()) {
            return Err(PpaError::Column(format!(
                "sample '{}': '{}' window does not match the grid of '{}'",
                sample, response_pattern, covariate_field
            )));
        }
        let cell_area = grid.cell_area();
        let mut data_cells = Vec::with_capacity(pattern.len());
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for p in pattern.points() {
            let (i, j) = grid.cell_of(p.x, p.y);
            let idx = grid.index(i, j);
            data_cells.push(idx);
            *counts.entry(idx).or_insert(0) += 1;
        }
        let occupancy = |idx: usize, has_dummy: bool| -> f64 {
            (counts.get(&idx).copied().unwrap_or(0) + usize::from(has_dummy)) as f64
        };

        for j in 0..grid.ny {
            for i in 0..grid.nx {
                let idx = grid.index(i, j);
                if let Some(value) = field.values()[idx] {
                    points.push(QuadPoint {
                        covariate: value,
                        weight: cell_area / occupancy(idx, true),
                        is_data: false,
                        row,
                    });
                }
            }
        }
        for (p, &idx) in pattern.points().iter().zip(data_cells.iter()) {
            let covariate = field.value_at(p.x, p.y).ok_or_else(|| PpaError::DegenerateWindow {
                sample: sample.clone(),
            })?;
            let has_dummy = field.values()[idx].is_some();
            points.push(QuadPoint {
                covariate,
                weight: cell_area / occupancy(idx, has_dummy),
                is_data: true,
                row,
            });
            n_data += 1;
        }
    }

    let levels: Vec<Vec<String>> = factor_values
        .iter()
        .map(|values| factor_levels(rows.iter().filter_map(|&r| values[r].as_deref())))
        .collect();
    let mut terms = vec![INTERCEPT.to_string(), covariate_field.to_string()];
    for (name, lv) in factors.iter().zip(levels.iter()) {
        terms.extend(lv.iter().skip(1).map(|l| factor_term(name, l)));
    }

    let n = points.len();
    let mut x = DMatrix::<f64>::zeros(n, terms.len());
    let mut y = DVector::<f64>::zeros(n);
    let mut w = DVector::<f64>::zeros(n);
    for (k, qp) in points.iter().enumerate() {
        x[(k, 0)] = 1.0;
        x[(k, 1)] = qp.covariate;
        let mut col = 2;
        for (values, lv) in factor_values.iter().zip(levels.iter()) {
            let value = values[qp.row].as_deref();
            for level in lv.iter().skip(1) {
                if value == Some(level.as_str()) {
                    x[(k, col)] = 1.0;
                }
                col += 1;
            }
        }
        w[k] = qp.weight;
        if qp.is_data {
            y[k] = 1.0 / qp.weight;
        }
    }

    Ok(QuadratureScheme {
        x,
        y,
        w,
        terms,
        n_data,
        n_dummy: n - n_data,
        sample_ids: rows.iter().map(|&r| table.ids()[r].clone()).collect(),
    })
}
