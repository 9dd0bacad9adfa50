use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::PpaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCorrection {
    None,
    Uniform,
    Diggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCachePolicy {
    /// Load a valid persisted model instead of fitting.
    NeverRefit,
    /// Ignore any persisted model and overwrite it.
    AlwaysRefit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    Reject,
    DropRows,
}

/// Explicit analysis configuration handed to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Grid cells along each axis of a density field.
    pub resolution: usize,
    /// Kernel bandwidth; `None` picks one eighth of the shortest window side.
    pub bandwidth: Option<f64>,
    pub edge_correction: EdgeCorrection,
    pub confidence_level: f64,
    pub model_cache_policy: ModelCachePolicy,
    pub missing_policy: MissingPolicy,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Prior standard deviation on every group-model coefficient.
    pub prior_sd: f64,
    pub fit_timeout_secs: Option<f64>,
    /// Worker threads for per-sample work (0 = auto).
    pub threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            resolution: 128,
            bandwidth: None,
            edge_correction: EdgeCorrection::Uniform,
            confidence_level: 0.95,
            model_cache_policy: ModelCachePolicy::NeverRefit,
            missing_policy: MissingPolicy::Reject,
            max_iterations: 100,
            tolerance: 1e-8,
            prior_sd: 1e3,
            fit_timeout_secs: None,
            threads: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, PpaError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PpaError> {
        if self.resolution < 2 {
            return Err(PpaError::InvalidConfig(format!(
                "resolution must be >= 2 (got {})",
                self.resolution
            )));
        }
        if let Some(bw) = self.bandwidth {
            if !(bw.is_finite() && bw > 0.0) {
                return Err(PpaError::InvalidBandwidth(bw));
            }
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PpaError::InvalidConfig(format!(
                "confidence_level must be in (0, 1) (got {})",
                self.confidence_level
            )));
        }
        if self.max_iterations == 0 {
            return Err(PpaError::InvalidConfig(
                "max_iterations must be > 0".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(PpaError::InvalidConfig(format!(
                "tolerance must be finite and > 0 (got {})",
                self.tolerance
            )));
        }
        if !(self.prior_sd.is_finite() && self.prior_sd > 0.0) {
            return Err(PpaError::InvalidConfig(format!(
                "prior_sd must be finite and > 0 (got {})",
                self.prior_sd
            )));
        }
        if let Some(secs) = self.fit_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(PpaError::InvalidConfig(format!(
                    "fit_timeout_secs must be finite and > 0 (got {})",
                    secs
                )));
            }
        }
        Ok(())
    }

    pub fn fit_control(&self) -> FitControl {
        FitControl {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            // A timeout too large to represent means no deadline.
            deadline: self
                .fit_timeout_secs
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .and_then(|limit| Instant::now().checked_add(limit)),
        }
    }
}

/// Iteration limits handed to a numerical engine for one fit.
#[derive(Debug, Clone, Copy)]
pub struct FitControl {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub deadline: Option<Instant>,
}

impl FitControl {
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
