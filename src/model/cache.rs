//! On-disk persistence of fitted models keyed by model ID.
//!
//! A cache file is a JSON envelope holding the serialized model as a string
//! together with its CRC-64/ECMA-182 checksum.

use std::fs;
use std::path::{Path, PathBuf};

use crc::{CRC_64_ECMA_182, Crc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ModelCachePolicy;
use crate::error::PpaError;
use crate::model::FittedModel;

const CACHE_SCHEMA: &str = "ppa-model-v1";
const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    schema_version: String,
    checksum: u64,
    payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Loaded,
    Fitted,
}

pub fn cache_path(dir: &Path, model_id: &str) -> PathBuf {
    let safe: String = model_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{}.json", safe))
}

pub fn save_model(path: &Path, model: &FittedModel) -> Result<(), PpaError> {
    let payload = serde_json::to_string(model)?;
    let envelope = CacheEnvelope {
        schema_version: CACHE_SCHEMA.to_string(),
        checksum: CRC64.checksum(payload.as_bytes()),
        payload,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &envelope)?;
    Ok(())
}

/// Reads a cached model, rejecting unknown schemas, checksum mismatches and
/// models stored under a different ID.
pub fn load_model(path: &Path, model_id: &str) -> Result<FittedModel, PpaError> {
    let content = fs::read_to_string(path)?;
    let envelope: CacheEnvelope = serde_json::from_str(&content)?;
    if envelope.schema_version != CACHE_SCHEMA {
        return Err(PpaError::load(
            path,
            format!("unknown model cache schema '{}'", envelope.schema_version),
        ));
    }
    let checksum = CRC64.checksum(envelope.payload.as_bytes());
    if checksum != envelope.checksum {
        return Err(PpaError::load(path, "model cache checksum mismatch"));
    }
    let model: FittedModel = serde_json::from_str(&envelope.payload)?;
    if model.id != model_id {
        return Err(PpaError::load(
            path,
            format!("cached model id '{}' does not match '{}'", model.id, model_id),
        ));
    }
    Ok(model)
}

/// Applies the cache policy around a fit.
///
/// `NeverRefit` returns a valid cached model without calling `fit`; an
/// absent or invalid cache falls through to fitting. `AlwaysRefit` always
/// fits. Fresh fits are written back to the cache.
pub fn fit_or_load<F>(
    dir: &Path,
    model_id: &str,
    policy: ModelCachePolicy,
    fit: F,
) -> Result<(FittedModel, CacheOutcome), PpaError>
where
    F: FnOnce() -> Result<FittedModel, PpaError>,
{
    let path = cache_path(dir, model_id);
    if policy == ModelCachePolicy::NeverRefit && path.exists() {
        match load_model(&path, model_id) {
            Ok(model) => {
                info!(model = model_id, path = %path.display(), "model_cache_hit");
                return Ok((model, CacheOutcome::Loaded));
            }
            Err(err) => {
                warn!(
                    model = model_id,
                    path = %path.display(),
                    error = %err,
                    "model cache invalid; refitting"
                );
            }
        }
    }

    let model = fit()?;
    save_model(&path, &model)?;
    info!(model = model_id, path = %path.display(), "model_cache_written");
    Ok((model, CacheOutcome::Fitted))
}
