use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{AnalysisConfig, EdgeCorrection, MissingPolicy, ModelCachePolicy};
use crate::error::PpaError;
use crate::simulate::{GroupSpec, SimulationSpec};

#[derive(Debug, Parser)]
#[command(
    name = "kira-ppa",
    version,
    about = "Point pattern analysis of cell distributions in tissue sections"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full analysis and write reports.
    Run(RunArgs),
    /// Load a dataset and check its structure.
    Validate(ValidateArgs),
    /// Write a synthetic multi-group dataset.
    Simulate(SimulateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, help = "Dataset JSON file (optionally .gz)")]
    pub input: PathBuf,

    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, help = "Pattern whose intensity is modelled")]
    pub response: String,

    #[arg(long, help = "Pattern whose density field is the covariate")]
    pub covariate: String,

    #[arg(long = "group", help = "Group-model covariate column (repeatable)")]
    pub group: Vec<String>,

    #[arg(long = "variance", help = "Log-scale covariate column (repeatable)")]
    pub variance: Vec<String>,

    #[arg(long = "cross-factor", help = "Factor added to the cross-pattern model (repeatable)")]
    pub cross_factor: Vec<String>,

    #[arg(long, help = "Analysis configuration JSON; flags override its values")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub bandwidth: Option<f64>,

    #[arg(long, help = "Density grid cells per axis")]
    pub resolution: Option<usize>,

    #[arg(long)]
    pub confidence: Option<f64>,

    #[arg(long, value_enum)]
    pub cache_policy: Option<CachePolicyArg>,

    #[arg(long, value_enum)]
    pub edge: Option<EdgeArg>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false)]
    pub tsv: bool,

    #[arg(long, help = "Number of threads (0 = auto)")]
    pub threads: Option<usize>,

    #[arg(long)]
    pub max_iter: Option<usize>,

    #[arg(long)]
    pub tol: Option<f64>,

    #[arg(long, default_value_t = false, help = "Drop rows with missing covariates")]
    pub drop_missing: bool,

    #[arg(long, help = "Per-fit time limit in seconds")]
    pub fit_timeout: Option<f64>,
}

impl RunArgs {
    /// Configuration file values (or defaults) with command-line overrides
    /// applied, validated.
    pub fn analysis_config(&self) -> Result<AnalysisConfig, PpaError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(bw) = self.bandwidth {
            config.bandwidth = Some(bw);
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(level) = self.confidence {
            config.confidence_level = level;
        }
        if let Some(policy) = self.cache_policy {
            config.model_cache_policy = policy.into();
        }
        if let Some(edge) = self.edge {
            config.edge_correction = edge.into();
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iterations = max_iter;
        }
        if let Some(tol) = self.tol {
            config.tolerance = tol;
        }
        if self.drop_missing {
            config.missing_policy = MissingPolicy::DropRows;
        }
        if let Some(secs) = self.fit_timeout {
            config.fit_timeout_secs = Some(secs);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[arg(long, help = "Dataset JSON file (optionally .gz)")]
    pub input: PathBuf,

    #[arg(long = "require", help = "Pattern every sample must carry (repeatable)")]
    pub require: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, help = "Output dataset path (.json or .json.gz)")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 5)]
    pub samples_per_group: usize,

    #[arg(
        long = "group",
        value_parser = parse_group,
        help = "LABEL:RESPONSE_INTENSITY:COVARIATE_INTENSITY (repeatable)"
    )]
    pub group: Vec<GroupArg>,

    #[arg(long, default_value_t = 10.0)]
    pub width: f64,

    #[arg(long, default_value_t = 10.0)]
    pub height: f64,

    #[arg(long, default_value_t = 0.0, help = "Fraction of response points clustered on covariate points")]
    pub clustering: f64,

    #[arg(long, default_value_t = 0.5)]
    pub cluster_sd: f64,

    #[arg(long, default_value = "tumor")]
    pub response: String,

    #[arg(long, default_value = "immune")]
    pub covariate: String,

    #[arg(long, default_value = "group")]
    pub group_column: String,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SimulateArgs {
    /// Falls back to the default two-group design when no `--group` is given.
    pub fn simulation_spec(&self) -> SimulationSpec {
        let defaults = SimulationSpec::default();
        let groups = if self.group.is_empty() {
            defaults.groups
        } else {
            self.group
                .iter()
                .map(|g| GroupSpec {
                    label: g.label.clone(),
                    response_intensity: g.response_intensity,
                    covariate_intensity: g.covariate_intensity,
                })
                .collect()
        };
        SimulationSpec {
            groups,
            samples_per_group: self.samples_per_group,
            width: self.width,
            height: self.height,
            clustering: self.clustering,
            cluster_sd: self.cluster_sd,
            response_pattern: self.response.clone(),
            covariate_pattern: self.covariate.clone(),
            group_column: self.group_column.clone(),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CachePolicyArg {
    NeverRefit,
    AlwaysRefit,
}

impl From<CachePolicyArg> for ModelCachePolicy {
    fn from(arg: CachePolicyArg) -> Self {
        match arg {
            CachePolicyArg::NeverRefit => ModelCachePolicy::NeverRefit,
            CachePolicyArg::AlwaysRefit => ModelCachePolicy::AlwaysRefit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EdgeArg {
    None,
    Uniform,
    Diggle,
}

impl From<EdgeArg> for EdgeCorrection {
    fn from(arg: EdgeArg) -> Self {
        match arg {
            EdgeArg::None => EdgeCorrection::None,
            EdgeArg::Uniform => EdgeCorrection::Uniform,
            EdgeArg::Diggle => EdgeCorrection::Diggle,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupArg {
    pub label: String,
    pub response_intensity: f64,
    pub covariate_intensity: f64,
}

fn parse_group(s: &str) -> Result<GroupArg, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [label, response, covariate] = parts.as_slice() else {
        return Err(format!("expected LABEL:RESPONSE:COVARIATE, got '{}'", s));
    };
    if label.trim().is_empty() {
        return Err("group label must not be empty".to_string());
    }
    let response: f64 = response
        .parse()
        .map_err(|_| format!("invalid response intensity '{}'", response))?;
    let covariate: f64 = covariate
        .parse()
        .map_err(|_| format!("invalid covariate intensity '{}'", covariate))?;
    Ok(GroupArg {
        label: label.to_string(),
        response_intensity: response,
        covariate_intensity: covariate,
    })
}
