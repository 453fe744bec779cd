//! CLI integration tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn cmm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cmm"))
        .args(args)
        .env_remove("COSTMGMT_BASE_DIR")
        .env_remove("COSTMGMT_API_URL")
        .output()
        .expect("Failed to execute command")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

const POD_REPORT: &str = "report_period_start,report_period_end,interval_start,interval_end,node,namespace,pod
2024-01-01 00:00:00 +0000 UTC,2024-02-01 00:00:00 +0000 UTC,2024-01-15 10:00:00 +0000 UTC,2024-01-15 10:59:59 +0000 UTC,worker-1,shop,web-1
";

fn seed_reports(base: &Path) {
    let data = base.join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("cm-openshift-pod-usage-202401.csv"), POD_REPORT).unwrap();
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = cmm(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Cost Metrics Operator"), "Should show app name");
    for command in ["inspect", "list", "package", "trim", "status", "health"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = cmm(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cmm"), "Should show binary name");
}

#[test]
fn test_package_help() {
    let output = cmm(&["package", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--copy"));
    assert!(stdout.contains("--max-size-mb"));
}

#[test]
fn test_list_reports_as_json() {
    let tmp = TempDir::new().unwrap();
    seed_reports(tmp.path());
    let base = tmp.path().to_str().unwrap();

    let output = cmm(&["--base-dir", base, "--format", "json", "list", "reports"]);

    assert!(output.status.success());
    let files = json(&output);
    assert_eq!(files.as_array().unwrap().len(), 1);
    assert_eq!(files[0]["kind"], "pod");
    assert_eq!(files[0]["name"], "cm-openshift-pod-usage-202401.csv");
}

#[test]
fn test_package_then_inspect() {
    let tmp = TempDir::new().unwrap();
    seed_reports(tmp.path());
    let base = tmp.path().to_str().unwrap();

    let output = cmm(&[
        "--base-dir", base, "--format", "json", "package", "--cluster-id", "cluster-a",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary = json(&output);
    assert_eq!(summary["packaged"], true);
    let archive = summary["archives"][0].as_str().unwrap().to_string();

    let path = tmp.path().join("upload").join(&archive);
    let output = cmm(&["--format", "json", "inspect", path.to_str().unwrap()]);
    assert!(output.status.success());
    let report = json(&output);
    assert_eq!(report["manifest"]["cluster_id"], "cluster-a");
    assert_eq!(report["manifest"]["files"].as_array().unwrap().len(), 1);
    assert!(report["members"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m == "manifest.json"));
}

#[test]
fn test_package_without_reports() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().to_str().unwrap();

    let output = cmm(&["--base-dir", base, "--format", "json", "package"]);

    assert!(output.status.success());
    assert_eq!(json(&output)["packaged"], false);
}

#[test]
fn test_trim_keeps_newest() {
    let tmp = TempDir::new().unwrap();
    let upload = tmp.path().join("upload");
    fs::create_dir_all(&upload).unwrap();
    for token in ["20240101T000000.000000", "20240102T000000.000000"] {
        fs::write(upload.join(format!("{token}-cost-mgmt.tar.gz")), "x").unwrap();
    }
    let base = tmp.path().to_str().unwrap();

    let output = cmm(&["--base-dir", base, "--format", "json", "trim", "--max-reports", "1"]);

    assert!(output.status.success());
    let summary = json(&output);
    assert_eq!(summary["stored"], 1);
    assert_eq!(
        summary["removed"][0],
        "20240101T000000.000000-cost-mgmt.tar.gz"
    );
}

#[test]
fn test_inspect_missing_archive_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("missing.tar.gz");

    let output = cmm(&["inspect", path.to_str().unwrap()]);

    assert!(!output.status.success());
}

/// Test invalid command handling
#[test]
fn test_invalid_command() {
    let output = cmm(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}
