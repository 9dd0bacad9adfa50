use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the analysis library.
///
/// Stages wrap these in `anyhow::Error`; callers that need to branch on the
/// failure kind can recover them with `downcast_ref::<PpaError>()`.
#[derive(Debug, Error)]
pub enum PpaError {
    #[error("failed to load dataset {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("invalid bandwidth {0}: must be finite and > 0")]
    InvalidBandwidth(f64),

    #[error("insufficient data: {observations} observations for {parameters} free parameters")]
    InsufficientData {
        observations: usize,
        parameters: usize,
    },

    #[error("fit did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },

    #[error("sample '{sample}' has a degenerate observation window")]
    DegenerateWindow { sample: String },

    #[error("missing value in column '{column}' for sample '{sample}'")]
    MissingValue { column: String, sample: String },

    #[error("column error: {0}")]
    Column(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PpaError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn convergence(iterations: usize, reason: impl Into<String>) -> Self {
        Self::Convergence {
            iterations,
            reason: reason.into(),
        }
    }
}
