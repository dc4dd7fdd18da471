//! Integration tests for the taper binary.
//!
//! These tests verify end-to-end behavior including:
//! - Plan generation from request files in every output format
//! - Configuration errors surfacing as a failed run
//! - Catalogue listing and config initialisation

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a test directory holding an empty config
fn setup_test_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "").unwrap();
    (temp_dir, config_path)
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("taper"))
}

fn write_request(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("request.json");
    fs::write(&path, body).unwrap();
    path
}

const OXYCODONE_REQUEST: &str = r#"{
    "class": "opioid",
    "medicine": "oxycodone_sr",
    "form": "modified_release",
    "lines": [{"strength": 40, "quantity": 1, "frequency": "BID"}],
    "phase1": {"percent": 25, "interval_days": 14},
    "start_date": "2025-01-06",
    "selected_strengths": [10, 20, 40]
}"#;

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Medication taper plan generator"));
}

#[test]
fn test_plan_table_output() {
    let (temp_dir, config) = setup_test_dir();
    let request = write_request(temp_dir.path(), OXYCODONE_REQUEST);

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::contains("Oxycodone SR (opioid, modified_release)"))
        .stdout(predicate::str::contains("2025-01-06  P1  60 mg/day"))
        .stdout(predicate::str::contains("2025-03-17  Review with prescriber"));
}

#[test]
fn test_plan_json_output() {
    let (temp_dir, config) = setup_test_dir();
    let request = write_request(temp_dir.path(), OXYCODONE_REQUEST);

    let output = cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = plan["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 6);
    assert_eq!(steps[0]["kind"], "dose");
    assert_eq!(steps[0]["phase"], 1);
    assert_eq!(steps[5]["kind"], "review");
}

#[test]
fn test_plan_csv_output_and_file() {
    let (temp_dir, config) = setup_test_dir();
    let request = write_request(temp_dir.path(), OXYCODONE_REQUEST);
    let csv_path = temp_dir.path().join("exports").join("plan.csv");

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .arg("--format")
        .arg("csv")
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "date,kind,phase,morning,midday,dinner,night,patches,total",
        ));

    let contents = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(contents.lines().count(), 7);
}

#[test]
fn test_start_date_override() {
    let (temp_dir, config) = setup_test_dir();
    let request = write_request(temp_dir.path(), OXYCODONE_REQUEST);

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .arg("--start")
        .arg("2025-02-03")
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-02-03  P1  60 mg/day"));
}

#[test]
fn test_invalid_phase_fails() {
    let (temp_dir, config) = setup_test_dir();
    let request = write_request(
        temp_dir.path(),
        &OXYCODONE_REQUEST.replace(r#""interval_days": 14"#, r#""interval_days": 0"#),
    );

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval"));
}

#[test]
fn test_patch_interval_mismatch_fails() {
    let (temp_dir, config) = setup_test_dir();
    let request = write_request(
        temp_dir.path(),
        r#"{
            "class": "opioid_patch",
            "medicine": "fentanyl",
            "form": "patch",
            "lines": [{"strength": 25, "quantity": 1}],
            "phase1": {"percent": 25, "interval_days": 5},
            "start_date": "2025-01-06"
        }"#,
    );

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("every 3 days"));
}

#[test]
fn test_missing_request_file_fails() {
    let (temp_dir, config) = setup_test_dir();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(temp_dir.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn test_short_cap_from_config() {
    let (temp_dir, config) = setup_test_dir();
    fs::write(&config, "[schedule]\ncap_days = 20\n").unwrap();
    let request = write_request(temp_dir.path(), OXYCODONE_REQUEST);

    cli()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-26  Review with prescriber"));
}

#[test]
fn test_catalogue_filtered_by_class() {
    let (_temp_dir, config) = setup_test_dir();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("catalogue")
        .arg("--class")
        .arg("opioid_patch")
        .assert()
        .success()
        .stdout(predicate::str::contains("fentanyl (Fentanyl, patch): 12.5, 25, 50, 75, 100 mcg/hr"))
        .stdout(predicate::str::contains("oxycodone").not());
}

#[test]
fn test_catalogue_unknown_class_fails() {
    let (_temp_dir, config) = setup_test_dir();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("catalogue")
        .arg("--class")
        .arg("antibiotic")
        .assert()
        .failure();
}

#[test]
fn test_init_config_writes_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = temp_dir.path().join("taper").join("config.toml");

    cli()
        .arg("--config")
        .arg(&config)
        .arg("init-config")
        .assert()
        .success();

    let contents = fs::read_to_string(&config).unwrap();
    assert!(contents.contains("cap_days = 90"));

    cli()
        .arg("--config")
        .arg(&config)
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}
