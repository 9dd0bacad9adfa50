//! Synthetic multi-group datasets.
//!
//! Every sample gets a homogeneous Poisson covariate pattern and a response
//! pattern in the same rectangular window. A fraction of the response points
//! can be placed around covariate points instead of uniformly, which makes
//! the response intensity depend on the covariate density.

use rand::prelude::*;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PpaError;
use crate::spatial::{Point, PointPattern, Window};
use crate::table::{Column, SampleCollection};

/// Attempts at placing a clustered point inside the window before falling
/// back to a uniform draw.
const MAX_CLUSTER_TRIES: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub label: String,
    /// Expected response points per unit area.
    pub response_intensity: f64,
    /// Expected covariate points per unit area.
    pub covariate_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSpec {
    pub groups: Vec<GroupSpec>,
    pub samples_per_group: usize,
    pub width: f64,
    pub height: f64,
    /// Fraction of response points drawn around covariate points, in [0, 1].
    pub clustering: f64,
    pub cluster_sd: f64,
    pub response_pattern: String,
    pub covariate_pattern: String,
    pub group_column: String,
    pub seed: u64,
}

impl Default for SimulationSpec {
    fn default() -> Self {
        Self {
            groups: vec![
                GroupSpec {
                    label: "A".to_string(),
                    response_intensity: 0.5,
                    covariate_intensity: 0.5,
                },
                GroupSpec {
                    label: "B".to_string(),
                    response_intensity: 1.0,
                    covariate_intensity: 0.5,
                },
            ],
            samples_per_group: 5,
            width: 10.0,
            height: 10.0,
            clustering: 0.0,
            cluster_sd: 0.5,
            response_pattern: "tumor".to_string(),
            covariate_pattern: "immune".to_string(),
            group_column: "group".to_string(),
            seed: 42,
        }
    }
}

impl SimulationSpec {
    pub fn validate(&self) -> Result<(), PpaError> {
        if self.groups.is_empty() || self.samples_per_group == 0 {
            return Err(PpaError::InvalidConfig(
                "simulation needs at least one group and one sample per group".to_string(),
            ));
        }
        if !(self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0)
        {
            return Err(PpaError::InvalidConfig(format!(
                "window must have positive size (got {}x{})",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.clustering) {
            return Err(PpaError::InvalidConfig(format!(
                "clustering must be in [0, 1] (got {})",
                self.clustering
            )));
        }
        if !(self.cluster_sd.is_finite() && self.cluster_sd > 0.0) {
            return Err(PpaError::InvalidConfig(format!(
                "cluster_sd must be finite and > 0 (got {})",
                self.cluster_sd
            )));
        }
        for g in &self.groups {
            let ok = |v: f64| v.is_finite() && v >= 0.0;
            if !ok(g.response_intensity) || !ok(g.covariate_intensity) {
                return Err(PpaError::InvalidConfig(format!(
                    "group '{}' has a negative or non-finite intensity",
                    g.label
                )));
            }
        }
        if self.response_pattern == self.covariate_pattern {
            return Err(PpaError::InvalidConfig(
                "response and covariate patterns need distinct names".to_string(),
            ));
        }
        Ok(())
    }
}

/// Draws a dataset with columns `response_pattern`, `covariate_pattern`
/// and the `group_column` factor. Identical specs give identical datasets.
pub fn simulate_dataset(spec: &SimulationSpec) -> Result<SampleCollection, PpaError> {
    spec.validate()?;
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let window = Window::rect(0.0, spec.width, 0.0, spec.height);
    let area = window.area();
    let jitter = Normal::new(0.0, spec.cluster_sd)
        .map_err(|e| PpaError::InvalidConfig(format!("cluster_sd: {}", e)))?;

    let mut ids = Vec::new();
    let mut responses = Vec::new();
    let mut covariates = Vec::new();
    let mut groups = Vec::new();
    for group in &spec.groups {
        for k in 0..spec.samples_per_group {
            let n_covariate = draw_count(&mut rng, group.covariate_intensity * area)?;
            let immune = uniform_points(&mut rng, &window, n_covariate);
            let n_response = draw_count(&mut rng, group.response_intensity * area)?;
            let mut tumor = Vec::with_capacity(n_response);
            for _ in 0..n_response {
                let clustered = !immune.is_empty() && rng.random::<f64>() < spec.clustering;
                let point = if clustered {
                    let parent = immune[rng.random_range(0..immune.len())];
                    clustered_point(&mut rng, &window, parent, &jitter)
                } else {
                    uniform_point(&mut rng, &window)
                };
                tumor.push(point);
            }

            ids.push(format!("{}_{:03}", group.label, k + 1));
            responses.push(PointPattern::new(window.clone(), tumor)?);
            covariates.push(PointPattern::new(window.clone(), immune)?);
            groups.push(Some(group.label.clone()));
        }
    }

    let mut collection = SampleCollection::new(ids)?;
    collection.append_column(spec.response_pattern.clone(), Column::Pattern(responses))?;
    collection.append_column(spec.covariate_pattern.clone(), Column::Pattern(covariates))?;
    collection.append_column(spec.group_column.clone(), Column::Factor(groups))?;
    info!(
        samples = collection.len(),
        groups = spec.groups.len(),
        seed = spec.seed,
        "dataset_simulated"
    );
    Ok(collection)
}

fn draw_count(rng: &mut StdRng, mean: f64) -> Result<usize, PpaError> {
    if mean <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(mean)
        .map_err(|e| PpaError::InvalidConfig(format!("poisson mean {}: {}", mean, e)))?;
    Ok(poisson.sample(rng) as usize)
}

fn uniform_point(rng: &mut StdRng, window: &Window) -> Point {
    let b = window.bounds();
    Point {
        x: rng.random_range(b.xmin..b.xmax),
        y: rng.random_range(b.ymin..b.ymax),
    }
}

fn uniform_points(rng: &mut StdRng, window: &Window, n: usize) -> Vec<Point> {
    (0..n).map(|_| uniform_point(rng, window)).collect()
}

fn clustered_point(rng: &mut StdRng, window: &Window, parent: Point, jitter: &Normal<f64>) -> Point {
    for _ in 0..MAX_CLUSTER_TRIES {
        let x = parent.x + jitter.sample(rng);
        let y = parent.y + jitter.sample(rng);
        if window.contains(x, y) {
            return Point { x, y };
        }
    }
    uniform_point(rng, window)
}
