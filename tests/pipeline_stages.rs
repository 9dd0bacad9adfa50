use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use kira_ppa::PpaError;
use kira_ppa::config::{AnalysisConfig, FitControl, ModelCachePolicy};
use kira_ppa::ctx::{AnalysisPlan, Ctx};
use kira_ppa::io::dataset::save_collection;
use kira_ppa::model::cache::CacheOutcome;
use kira_ppa::model::{FitOutcome, GroupProblem, RegressionFitter};
use kira_ppa::pipeline::{Pipeline, Stage};
use kira_ppa::simulate::{SimulationSpec, simulate_dataset};
use kira_ppa::table::ColumnKind;
use tempfile::TempDir;

fn write_input(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("dataset.json");
    let collection = simulate_dataset(&SimulationSpec::default()).unwrap();
    save_collection(&path, &collection).unwrap();
    path
}

fn plan() -> AnalysisPlan {
    AnalysisPlan {
        response_pattern: "tumor".to_string(),
        covariate_pattern: "immune".to_string(),
        group_covariates: vec!["group".to_string()],
        variance_covariates: Vec::new(),
        cross_factors: Vec::new(),
    }
}

fn config() -> AnalysisConfig {
    AnalysisConfig {
        resolution: 24,
        ..AnalysisConfig::default()
    }
}

fn new_ctx(input: &Path, out: &Path, config: AnalysisConfig) -> Ctx {
    Ctx::new(
        input.to_path_buf(),
        out.to_path_buf(),
        plan(),
        config,
        true,
        true,
        env!("CARGO_PKG_VERSION"),
    )
}

#[test]
fn full_pipeline_appends_columns_in_order() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path());
    let out = tmp.path().join("out");
    let mut ctx = new_ctx(&input, &out, config());
    Pipeline::full().run(&mut ctx).unwrap();

    let collection = ctx.collection().unwrap();
    let names: Vec<&str> = collection.column_names().collect();
    assert_eq!(
        names,
        vec![
            "immune",
            "tumor",
            "group",
            "intensity_immune",
            "intensity_tumor",
            "density_immune",
            "group_model",
            "fitted_tumor",
        ]
    );
    assert_eq!(collection.column_kind("density_immune"), Some(ColumnKind::Field));
    assert_eq!(
        collection.model_refs("group_model").unwrap()[0].model_id,
        "group__intensity_tumor__group"
    );
    assert!(ctx.group_model.is_some());
    assert!(ctx.cross_model.is_some());
    assert_eq!(ctx.group_summaries.len(), 2);
    assert_eq!(ctx.report.intensities.len(), 2 * collection.len());
    assert!(out.join("ppa.json").exists());
    assert!(out.join("intensity.tsv").exists());
    assert!(out.join("coefficients.tsv").exists());
}

#[test]
fn second_run_loads_cached_models() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path());
    let out = tmp.path().join("out");

    let mut first = new_ctx(&input, &out, config());
    Pipeline::full().run(&mut first).unwrap();
    assert_eq!(first.group_model_source, Some(CacheOutcome::Fitted));

    let mut second = new_ctx(&input, &out, config());
    Pipeline::full().run(&mut second).unwrap();
    assert_eq!(second.group_model_source, Some(CacheOutcome::Loaded));
    assert_eq!(second.cross_model_source, Some(CacheOutcome::Loaded));
    let (a, b) = (
        first.group_model.as_ref().unwrap(),
        second.group_model.as_ref().unwrap(),
    );
    assert_eq!(a.id, b.id);
    for (x, y) in a.coefficients.iter().zip(b.coefficients.iter()) {
        assert_eq!(x.name, y.name);
        assert!((x.estimate - y.estimate).abs() < 1e-12);
    }

    let refit = AnalysisConfig {
        model_cache_policy: ModelCachePolicy::AlwaysRefit,
        ..config()
    };
    let mut third = new_ctx(&input, &out, refit);
    Pipeline::full().run(&mut third).unwrap();
    assert_eq!(third.group_model_source, Some(CacheOutcome::Fitted));
}

struct FailingFitter;

impl RegressionFitter for FailingFitter {
    fn fit(&self, _: &GroupProblem, control: &FitControl) -> Result<FitOutcome, PpaError> {
        Err(PpaError::Convergence {
            iterations: control.max_iterations,
            reason: "stub".to_string(),
        })
    }
}

#[test]
fn failing_stage_keeps_earlier_columns() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path());
    let out = tmp.path().join("out");
    let mut ctx = new_ctx(&input, &out, config());
    ctx.engines.regression = Box::new(FailingFitter);

    let err = Pipeline::full().run(&mut ctx).unwrap_err();
    assert_eq!(err.to_string(), "stage4_group_model failed");
    let typed = err.downcast_ref::<PpaError>().unwrap();
    assert!(matches!(typed, PpaError::Convergence { .. }));

    let collection = ctx.collection().unwrap();
    assert!(collection.has_column("density_immune"));
    assert!(collection.has_column("intensity_tumor"));
    assert!(!collection.has_column("group_model"));
    assert!(ctx.cross_model.is_none());
    assert!(!out.join("ppa.json").exists());
}

#[test]
fn missing_covariate_column_fails_at_load() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path());
    let mut ctx = new_ctx(&input, &tmp.path().join("out"), config());
    ctx.plan.group_covariates = vec!["stage".to_string()];
    let err = Pipeline::full().run(&mut ctx).unwrap_err();
    assert_eq!(err.to_string(), "stage1_load failed");
    assert!(format!("{:#}", err).contains("covariate 'stage' not found"));
    assert!(ctx.collection.is_none());
}

#[test]
fn invalid_config_fails_before_loading() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path());
    let bad = AnalysisConfig {
        bandwidth: Some(-1.0),
        ..config()
    };
    let mut ctx = new_ctx(&input, &tmp.path().join("out"), bad);
    assert!(Pipeline::full().run(&mut ctx).is_err());
    assert!(ctx.collection.is_none());
}

struct Marker {
    name: &'static str,
    runs: Rc<Cell<usize>>,
    fail: bool,
}

impl Stage for Marker {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        self.runs.set(self.runs.get() + 1);
        if self.fail {
            anyhow::bail!("{} could not finish", self.name);
        }
        ctx.warnings.push(self.name.to_string());
        Ok(())
    }
}

#[test]
fn runner_stops_at_the_first_failing_stage() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path());
    let mut ctx = new_ctx(&input, &tmp.path().join("out"), config());
    let runs: Vec<Rc<Cell<usize>>> = (0..3).map(|_| Rc::new(Cell::new(0))).collect();
    let marker = |name, i: usize, fail| -> Box<dyn Stage> {
        Box::new(Marker {
            name,
            runs: Rc::clone(&runs[i]),
            fail,
        })
    };
    let pipeline = Pipeline::new(vec![
        marker("first", 0, false),
        marker("second", 1, true),
        marker("third", 2, false),
    ]);

    let err = pipeline.run(&mut ctx).unwrap_err();
    assert_eq!(err.to_string(), "second failed");
    assert_eq!(format!("{:#}", err), "second failed: second could not finish");
    let counts: Vec<usize> = runs.iter().map(|r| r.get()).collect();
    assert_eq!(counts, vec![1, 1, 0]);
    assert_eq!(ctx.warnings, vec!["first".to_string()]);
}
