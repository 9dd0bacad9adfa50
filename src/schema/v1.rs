use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::model::{FittedModel, GroupSummary};
use crate::spatial::Window;

pub const SCHEMA_VERSION: &str = "v1";

/// Persisted dataset: one record per sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetV1 {
    pub schema_version: String,
    pub samples: Vec<SampleRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub scalars: BTreeMap<String, Option<f64>>,
    pub patterns: BTreeMap<String, PatternRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecord {
    pub window: Window,
    /// `null` coordinates are accepted by the parser and rejected on load.
    pub points: Vec<[Option<f64>; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMeta {
    pub path: String,
    pub samples: u64,
    pub patterns: Vec<String>,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntensityRow {
    pub sample: String,
    pub pattern: String,
    pub count: u64,
    pub area: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityRow {
    pub sample: String,
    pub pattern: String,
    pub bandwidth: f64,
    pub integral: f64,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpaReportV1 {
    pub tool: String,
    pub version: String,
    pub schema_version: String,
    pub input: InputMeta,
    pub config: AnalysisConfig,
    pub intensities: Vec<IntensityRow>,
    pub density: Vec<DensityRow>,
    pub group_summaries: Vec<GroupSummary>,
    pub group_model: Option<FittedModel>,
    pub cross_model: Option<FittedModel>,
    pub warnings: Vec<String>,
}

impl PpaReportV1 {
    pub fn empty(tool_version: &str, config: AnalysisConfig) -> Self {
        Self {
            tool: "kira-ppa".to_string(),
            version: tool_version.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            input: InputMeta {
                path: String::new(),
                samples: 0,
                patterns: Vec::new(),
                factors: Vec::new(),
            },
            config,
            intensities: Vec::new(),
            density: Vec::new(),
            group_summaries: Vec::new(),
            group_model: None,
            cross_model: None,
            warnings: Vec::new(),
        }
    }
}
