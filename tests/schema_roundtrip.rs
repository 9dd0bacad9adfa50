use kira_ppa::config::{AnalysisConfig, EdgeCorrection, MissingPolicy, ModelCachePolicy};
use kira_ppa::schema::v1::{PpaReportV1, SCHEMA_VERSION};
use tempfile::TempDir;

#[test]
fn report_roundtrip() {
    let report = PpaReportV1::empty("0.1.0", AnalysisConfig::default());
    let json = serde_json::to_string(&report).unwrap();
    let back: PpaReportV1 = serde_json::from_str(&json).unwrap();
    assert_eq!(back.schema_version, SCHEMA_VERSION);
    assert_eq!(back.tool, "kira-ppa");
    assert!(back.group_model.is_none());
    assert_eq!(back.config.resolution, 128);
}

#[test]
fn config_defaults_fill_missing_fields() {
    let config: AnalysisConfig =
        serde_json::from_str(r#"{"edge_correction": "none", "missing_policy": "drop_rows"}"#)
            .unwrap();
    assert_eq!(config.edge_correction, EdgeCorrection::None);
    assert_eq!(config.missing_policy, MissingPolicy::DropRows);
    assert_eq!(config.model_cache_policy, ModelCachePolicy::NeverRefit);
    assert_eq!(config.confidence_level, 0.95);
    assert!(config.validate().is_ok());
}

#[test]
fn config_file_validation() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, r#"{"confidence_level": 1.5}"#).unwrap();
    assert!(AnalysisConfig::from_json_file(&path).is_err());

    std::fs::write(&path, r#"{"model_cache_policy": "always_refit", "tolerance": 1e-6}"#).unwrap();
    let config = AnalysisConfig::from_json_file(&path).unwrap();
    assert_eq!(config.model_cache_policy, ModelCachePolicy::AlwaysRefit);
    assert_eq!(config.tolerance, 1e-6);

    for bad in [
        r#"{"resolution": 1}"#,
        r#"{"bandwidth": -2.0}"#,
        r#"{"max_iterations": 0}"#,
        r#"{"prior_sd": 0.0}"#,
        r#"{"fit_timeout_secs": -1.0}"#,
    ] {
        std::fs::write(&path, bad).unwrap();
        assert!(AnalysisConfig::from_json_file(&path).is_err(), "{}", bad);
    }
}

#[test]
fn oversized_fit_timeout_means_no_deadline() {
    let config = AnalysisConfig {
        fit_timeout_secs: Some(1e300),
        ..AnalysisConfig::default()
    };
    config.validate().unwrap();
    let control = config.fit_control();
    assert!(control.deadline.is_none());
    assert!(!control.expired());

    let bounded = AnalysisConfig {
        fit_timeout_secs: Some(3600.0),
        ..AnalysisConfig::default()
    };
    let control = bounded.fit_control();
    assert!(control.deadline.is_some());
    assert!(!control.expired());
}
