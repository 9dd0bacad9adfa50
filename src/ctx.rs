use std::path::PathBuf;

use crate::config::AnalysisConfig;
use crate::model::cache::CacheOutcome;
use crate::model::{
    FittedModel, GroupSummary, HeteroscedasticGaussian, PointProcessFitter,
    PoissonQuadratureFitter, RegressionFitter,
};
use crate::schema::v1::PpaReportV1;
use crate::spatial::{GaussianSmoother, Smoother};
use crate::table::SampleCollection;

pub fn intensity_column(pattern: &str) -> String {
    format!("intensity_{}", pattern)
}

pub fn density_column(pattern: &str) -> String {
    format!("density_{}", pattern)
}

pub fn fitted_column(response: &str) -> String {
    format!("fitted_{}", response)
}

pub const GROUP_MODEL_COLUMN: &str = "group_model";

/// Which columns the analysis runs on.
#[derive(Debug, Clone)]
pub struct AnalysisPlan {
    /// Pattern whose intensity is modelled.
    pub response_pattern: String,
    /// Pattern whose density field is the cross-pattern covariate.
    pub covariate_pattern: String,
    /// Factor columns for the group model mean.
    pub group_covariates: Vec<String>,
    /// Factor columns for the group model log scale.
    pub variance_covariates: Vec<String>,
    /// Factor columns added to the cross-pattern model.
    pub cross_factors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub out_dir: PathBuf,
    pub json_path: PathBuf,
    pub intensity_tsv_path: PathBuf,
    pub coefficients_tsv_path: PathBuf,
    pub model_cache_dir: PathBuf,
}

/// Numerical engines used by the pipeline stages.
pub struct Engines {
    pub smoother: Box<dyn Smoother>,
    pub regression: Box<dyn RegressionFitter>,
    pub point_process: Box<dyn PointProcessFitter>,
}

impl Default for Engines {
    fn default() -> Self {
        Self {
            smoother: Box::new(GaussianSmoother),
            regression: Box::new(HeteroscedasticGaussian),
            point_process: Box::new(PoissonQuadratureFitter),
        }
    }
}

pub struct Ctx {
    pub input: PathBuf,
    pub plan: AnalysisPlan,
    pub config: AnalysisConfig,
    pub engines: Engines,
    pub write_json: bool,
    pub write_tsv: bool,
    pub collection: Option<SampleCollection>,
    pub group_summaries: Vec<GroupSummary>,
    pub group_model: Option<FittedModel>,
    pub group_model_source: Option<CacheOutcome>,
    pub cross_model: Option<FittedModel>,
    pub cross_model_source: Option<CacheOutcome>,
    pub warnings: Vec<String>,
    pub output: OutputPaths,
    pub report: PpaReportV1,
}

impl Ctx {
    pub fn new(
        input: PathBuf,
        out_dir: PathBuf,
        plan: AnalysisPlan,
        config: AnalysisConfig,
        write_json: bool,
        write_tsv: bool,
        tool_version: &str,
    ) -> Self {
        let json_path = out_dir.join("ppa.json");
        let intensity_tsv_path = out_dir.join("intensity.tsv");
        let coefficients_tsv_path = out_dir.join("coefficients.tsv");
        let model_cache_dir = out_dir.join("models");
        let report = PpaReportV1::empty(tool_version, config.clone());
        Self {
            input,
            plan,
            config,
            engines: Engines::default(),
            write_json,
            write_tsv,
            collection: None,
            group_summaries: Vec::new(),
            group_model: None,
            group_model_source: None,
            cross_model: None,
            cross_model_source: None,
            warnings: Vec::new(),
            output: OutputPaths {
                out_dir,
                json_path,
                intensity_tsv_path,
                coefficients_tsv_path,
                model_cache_dir,
            },
            report,
        }
    }

    pub fn collection(&self) -> anyhow::Result<&SampleCollection> {
        self.collection
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("sample collection not loaded"))
    }

    pub fn collection_mut(&mut self) -> anyhow::Result<&mut SampleCollection> {
        self.collection
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("sample collection not loaded"))
    }
}
