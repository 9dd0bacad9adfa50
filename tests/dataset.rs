use std::fs;
use std::path::Path;

use kira_ppa::PpaError;
use kira_ppa::io::dataset::{LoadOptions, load_collection, save_collection};
use kira_ppa::table::ColumnKind;
use serde_json::json;
use tempfile::TempDir;

fn write_dataset(path: &Path, value: serde_json::Value) {
    fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn two_samples() -> serde_json::Value {
    json!({
        "schema_version": "v1",
        "samples": [
            {
                "id": "s1",
                "metadata": {"grade": "2"},
                "scalars": {"age": 63.0},
                "patterns": {
                    "tumor": {
                        "window": {"type": "rect", "xmin": 0, "xmax": 10, "ymin": 0, "ymax": 10},
                        "points": [[1.0, 2.0], [3.5, 7.25]]
                    },
                    "immune": {
                        "window": {"type": "rect", "xmin": 0, "xmax": 10, "ymin": 0, "ymax": 10},
                        "points": [],
                        "label": "CD8"
                    }
                }
            },
            {
                "id": "s2",
                "metadata": {"grade": null},
                "scalars": {"age": null},
                "patterns": {
                    "tumor": {
                        "window": {"type": "polygon", "vertices": [[0, 0], [6, 0], [0, 6]]},
                        "points": [[1.0, 1.0]]
                    },
                    "immune": {
                        "window": {"type": "polygon", "vertices": [[0, 0], [6, 0], [0, 6]]},
                        "points": [[2.0, 2.0], [0.5, 4.0]]
                    }
                }
            }
        ]
    })
}

fn required(patterns: &[&str]) -> LoadOptions {
    LoadOptions {
        required_patterns: patterns.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn loads_patterns_factors_and_scalars() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.json");
    write_dataset(&path, two_samples());

    let c = load_collection(&path, &required(&["tumor", "immune"])).unwrap();
    assert_eq!(c.ids(), &["s1".to_string(), "s2".to_string()]);
    assert_eq!(
        c.names_of_kind(ColumnKind::Pattern),
        vec!["immune".to_string(), "tumor".to_string()]
    );
    assert_eq!(c.factors("grade").unwrap(), &[Some("2".to_string()), None]);
    assert_eq!(c.scalars("age").unwrap(), &[Some(63.0), None]);
    let tumor = c.patterns("tumor").unwrap();
    assert_eq!(tumor[0].len(), 2);
    assert!((tumor[1].window().area() - 18.0).abs() < 1e-12);
    assert_eq!(c.patterns("immune").unwrap()[0].label(), Some("CD8"));
}

#[test]
fn save_then_load_preserves_content_with_gzip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.json");
    write_dataset(&path, two_samples());
    let original = load_collection(&path, &LoadOptions::default()).unwrap();

    let gz = tmp.path().join("copy.json.gz");
    save_collection(&gz, &original).unwrap();
    let bytes = fs::read(&gz).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let reloaded = load_collection(&gz, &LoadOptions::default()).unwrap();
    assert_eq!(reloaded.ids(), original.ids());
    assert_eq!(
        reloaded.patterns("tumor").unwrap(),
        original.patterns("tumor").unwrap()
    );
    assert_eq!(
        reloaded.factors("grade").unwrap(),
        original.factors("grade").unwrap()
    );
    assert_eq!(
        reloaded.scalars("age").unwrap(),
        original.scalars("age").unwrap()
    );
}

#[test]
fn missing_coordinate_is_a_load_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.json");
    let mut value = two_samples();
    value["samples"][1]["patterns"]["immune"]["points"][1] = json!([0.5, null]);
    write_dataset(&path, value);

    let err = load_collection(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, PpaError::Load { .. }), "{:?}", err);
    assert!(err.to_string().contains("missing coordinate"));
}

#[test]
fn missing_required_pattern_is_a_load_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.json");
    write_dataset(&path, two_samples());

    let err = load_collection(&path, &required(&["stroma"])).unwrap_err();
    assert!(matches!(err, PpaError::Load { .. }));
    assert!(err.to_string().contains("stroma"));
}

#[test]
fn inconsistent_columns_and_bad_files_fail() {
    let tmp = TempDir::new().unwrap();

    let path = tmp.path().join("ragged.json");
    let mut value = two_samples();
    value["samples"][1]["scalars"] = json!({});
    write_dataset(&path, value);
    assert!(matches!(
        load_collection(&path, &LoadOptions::default()),
        Err(PpaError::Load { .. })
    ));

    let path = tmp.path().join("outside.json");
    let mut value = two_samples();
    value["samples"][0]["patterns"]["tumor"]["points"][0] = json!([11.0, 2.0]);
    write_dataset(&path, value);
    assert!(load_collection(&path, &LoadOptions::default()).is_err());

    let path = tmp.path().join("degenerate.json");
    let mut value = two_samples();
    value["samples"][0]["patterns"]["tumor"]["window"] =
        json!({"type": "rect", "xmin": 0, "xmax": 0, "ymin": 0, "ymax": 10});
    write_dataset(&path, value);
    assert!(load_collection(&path, &LoadOptions::default()).is_err());

    let path = tmp.path().join("garbage.json");
    fs::write(&path, b"not json").unwrap();
    assert!(matches!(
        load_collection(&path, &LoadOptions::default()),
        Err(PpaError::Load { .. })
    ));

    let missing = tmp.path().join("absent.json");
    assert!(matches!(
        load_collection(&missing, &LoadOptions::default()),
        Err(PpaError::Load { .. })
    ));
}

#[test]
fn empty_dataset_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("empty.json");
    write_dataset(&path, json!({"schema_version": "v1", "samples": []}));
    assert!(load_collection(&path, &LoadOptions::default()).is_err());
}

#[test]
fn patterns_of_one_sample_must_share_a_window() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mixed.json");
    let mut value = two_samples();
    value["samples"][0]["patterns"]["immune"]["window"] =
        json!({"type": "rect", "xmin": 0, "xmax": 1, "ymin": 0, "ymax": 1});
    write_dataset(&path, value);

    let err = load_collection(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, PpaError::Load { .. }), "{:?}", err);
    assert!(err.to_string().contains("different windows"), "{}", err);
}
