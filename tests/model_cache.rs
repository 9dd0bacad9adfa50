use std::cell::Cell;
use std::fs;

use kira_ppa::PpaError;
use kira_ppa::config::ModelCachePolicy;
use kira_ppa::model::cache::{CacheOutcome, cache_path, fit_or_load, load_model, save_model};
use kira_ppa::model::{
    Coefficient, Component, FittedModel, INTERCEPT, IntervalKind, ModelKind, TableSnapshot,
};
use tempfile::TempDir;

fn model(id: &str, estimate: f64) -> FittedModel {
    FittedModel {
        id: id.to_string(),
        kind: ModelKind::CrossPattern,
        response: "tumor".to_string(),
        coefficients: vec![Coefficient {
            name: INTERCEPT.to_string(),
            component: Component::Mean,
            estimate,
            std_error: 0.1,
            lower: estimate - 0.25,
            upper: estimate + 0.25,
        }],
        interval: IntervalKind::Confidence,
        confidence_level: 0.95,
        n_obs: 42,
        iterations: 5,
        log_likelihood: -12.5,
        snapshot: TableSnapshot {
            sample_ids: vec!["s1".to_string()],
            columns: vec!["tumor".to_string()],
        },
    }
}

#[test]
fn never_refit_reuses_cached_model() {
    let tmp = TempDir::new().unwrap();
    let calls = Cell::new(0);
    let fit = |estimate: f64| {
        calls.set(calls.get() + 1);
        Ok(model("m1", estimate))
    };

    let (first, outcome) =
        fit_or_load(tmp.path(), "m1", ModelCachePolicy::NeverRefit, || fit(1.0)).unwrap();
    assert_eq!(outcome, CacheOutcome::Fitted);
    assert!(cache_path(tmp.path(), "m1").exists());

    let (second, outcome) =
        fit_or_load(tmp.path(), "m1", ModelCachePolicy::NeverRefit, || fit(2.0)).unwrap();
    assert_eq!(outcome, CacheOutcome::Loaded);
    assert_eq!(second, first);
    assert_eq!(calls.get(), 1);
}

#[test]
fn always_refit_overwrites_cache() {
    let tmp = TempDir::new().unwrap();
    fit_or_load(tmp.path(), "m1", ModelCachePolicy::AlwaysRefit, || {
        Ok(model("m1", 1.0))
    })
    .unwrap();
    let (refit, outcome) = fit_or_load(tmp.path(), "m1", ModelCachePolicy::AlwaysRefit, || {
        Ok(model("m1", 3.0))
    })
    .unwrap();
    assert_eq!(outcome, CacheOutcome::Fitted);
    assert_eq!(refit.coefficients[0].estimate, 3.0);

    let stored = load_model(&cache_path(tmp.path(), "m1"), "m1").unwrap();
    assert_eq!(stored.coefficients[0].estimate, 3.0);
}

#[test]
fn corrupted_cache_is_refitted() {
    let tmp = TempDir::new().unwrap();
    let path = cache_path(tmp.path(), "m1");
    save_model(&path, &model("m1", 1.0)).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("-12.5", "-13.5")).unwrap();
    let err = load_model(&path, "m1").unwrap_err();
    assert!(err.to_string().contains("checksum"));

    let (refit, outcome) = fit_or_load(tmp.path(), "m1", ModelCachePolicy::NeverRefit, || {
        Ok(model("m1", 4.0))
    })
    .unwrap();
    assert_eq!(outcome, CacheOutcome::Fitted);
    assert_eq!(refit.coefficients[0].estimate, 4.0);
    assert!(load_model(&path, "m1").is_ok());
}

#[test]
fn cached_model_must_match_id() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("m.json");
    save_model(&path, &model("m1", 1.0)).unwrap();
    let err = load_model(&path, "m2").unwrap_err();
    assert!(matches!(err, PpaError::Load { .. }));
}

#[test]
fn fit_errors_propagate_and_leave_no_cache() {
    let tmp = TempDir::new().unwrap();
    let err = fit_or_load(tmp.path(), "m1", ModelCachePolicy::NeverRefit, || {
        Err(PpaError::InsufficientData {
            observations: 1,
            parameters: 3,
        })
    })
    .unwrap_err();
    assert!(matches!(err, PpaError::InsufficientData { .. }));
    assert!(!cache_path(tmp.path(), "m1").exists());
}

#[test]
fn cache_file_names_are_sanitised() {
    let tmp = TempDir::new().unwrap();
    let path = cache_path(tmp.path(), "group__a+b/c d");
    assert_eq!(path.file_name().unwrap(), "group__a+b_c_d.json");
}
