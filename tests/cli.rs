use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

fn simulate(out: &Path) {
    let mut cmd = Command::cargo_bin("kira-ppa").unwrap();
    cmd.arg("simulate")
        .arg("--out")
        .arg(out)
        .arg("--samples-per-group")
        .arg("4")
        .arg("--group")
        .arg("ctrl:0.5:0.5")
        .arg("--group")
        .arg("treated:1.0:0.5")
        .arg("--seed")
        .arg("9");
    cmd.assert().success();
}

fn run(input: &Path, out: &Path, extra: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("kira-ppa").unwrap();
    cmd.arg("run")
        .arg("--input")
        .arg(input)
        .arg("--out")
        .arg(out)
        .arg("--response")
        .arg("tumor")
        .arg("--covariate")
        .arg("immune")
        .arg("--group")
        .arg("group")
        .arg("--resolution")
        .arg("24")
        .args(extra);
    cmd.assert()
}

#[test]
fn cli_help_smoke() {
    let mut cmd = Command::cargo_bin("kira-ppa").unwrap();
    cmd.arg("--help");
    cmd.assert().success();
}

#[test]
fn run_requires_response_and_covariate() {
    let mut cmd = Command::cargo_bin("kira-ppa").unwrap();
    cmd.args(["run", "--input", "x.json", "--out", "out"]);
    cmd.assert().failure();
}

#[test]
fn simulate_then_validate() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json.gz");
    simulate(&data);
    assert!(data.exists());

    let mut cmd = Command::cargo_bin("kira-ppa").unwrap();
    cmd.arg("validate")
        .arg("--input")
        .arg(&data)
        .arg("--require")
        .arg("tumor");
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("kira-ppa validate ok"));
    assert!(text.contains("samples: 8"));
}

#[test]
fn validate_rejects_missing_pattern() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json");
    simulate(&data);
    let mut cmd = Command::cargo_bin("kira-ppa").unwrap();
    cmd.arg("validate")
        .arg("--input")
        .arg(&data)
        .arg("--require")
        .arg("stroma");
    cmd.assert().failure();
}

#[test]
fn run_writes_reports() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json");
    simulate(&data);
    let out = tmp.path().join("out");
    let output = run(&data, &out, &["--json", "--tsv"])
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("kira-ppa v"));
    assert!(text.contains("Group model"));
    assert!(text.contains("Cross-pattern model"));

    let v: Value = serde_json::from_slice(&fs::read(out.join("ppa.json")).unwrap()).unwrap();
    assert_eq!(v["tool"], "kira-ppa");
    assert_eq!(v["schema_version"], "v1");
    assert_eq!(v["input"]["samples"], 8);
    assert_eq!(v["intensities"].as_array().unwrap().len(), 16);
    assert_eq!(v["density"].as_array().unwrap().len(), 8);
    assert_eq!(v["group_model"]["interval"], "credible");
    assert_eq!(v["cross_model"]["interval"], "confidence");
    assert_eq!(v["config"]["resolution"], 24);

    let header = fs::read_to_string(out.join("intensity.tsv"))
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string();
    assert_eq!(header, "sample\tpattern\tcount\tarea\tintensity");

    let coefficients = fs::read_to_string(out.join("coefficients.tsv")).unwrap();
    let mut lines = coefficients.lines();
    assert_eq!(
        lines.next().unwrap(),
        "model\tcomponent\tterm\testimate\tstd_error\tlower\tupper\trate_ratio"
    );
    assert!(coefficients.contains("group=treated"));
    assert!(coefficients.contains("density_immune"));
}

#[test]
fn run_without_flags_writes_no_reports() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json");
    simulate(&data);
    let out = tmp.path().join("out");
    run(&data, &out, &[]).success();
    assert!(!out.join("ppa.json").exists());
    assert!(!out.join("intensity.tsv").exists());
    assert!(out.join("models").is_dir());
}

#[test]
fn run_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json");
    simulate(&data);
    let out1 = tmp.path().join("out1");
    let out2 = tmp.path().join("out2");
    run(&data, &out1, &["--tsv"]).success();
    run(&data, &out2, &["--tsv"]).success();
    assert_eq!(
        fs::read(out1.join("coefficients.tsv")).unwrap(),
        fs::read(out2.join("coefficients.tsv")).unwrap()
    );
}

#[test]
fn run_rejects_invalid_bandwidth() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json");
    simulate(&data);
    run(&data, &tmp.path().join("out"), &["--bandwidth", "0"]).failure();
}

#[test]
fn config_file_is_applied_and_overridden() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data.json");
    simulate(&data);
    let config = tmp.path().join("config.json");
    fs::write(
        &config,
        r#"{"resolution": 16, "edge_correction": "diggle", "confidence_level": 0.9}"#,
    )
    .unwrap();
    let out = tmp.path().join("out");
    run(
        &data,
        &out,
        &["--config", config.to_str().unwrap(), "--confidence", "0.8", "--json"],
    )
    .success();
    let v: Value = serde_json::from_slice(&fs::read(out.join("ppa.json")).unwrap()).unwrap();
    // --resolution 24 on the command line wins over the file.
    assert_eq!(v["config"]["resolution"], 24);
    assert_eq!(v["config"]["edge_correction"], "diggle");
    assert_eq!(v["config"]["confidence_level"], 0.8);
}
