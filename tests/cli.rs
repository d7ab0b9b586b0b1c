use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// Binary under test, isolated from any real config files.
fn token_guard(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("token-guard").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(30));
    cmd
}

fn read_report(path: &std::path::Path) -> Value {
    let content = fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("token-guard"));
}

#[test]
fn test_no_arguments_prints_help() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("--budget"))
        .stdout(predicate::str::contains("--cost-limit"));
}

#[test]
fn test_missing_command_fails() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .args(["-b", "100"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No command specified"));
}

#[test]
fn test_rejects_non_numeric_budget() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .args(["-b", "lots", "--", "true"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_exit_code_passes_through() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .args(["-q", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);
}

#[cfg(unix)]
#[test]
fn test_output_passes_through() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .args(["-q", "--", "sh", "-c", "echo hello from child; echo oops >&2"])
        .assert()
        .success()
        .stdout("hello from child\n")
        .stderr(predicate::str::contains("oops"));
}

#[test]
fn test_launch_failure_exits_one() {
    let home = TempDir::new().unwrap();
    token_guard(&home)
        .args(["--", "token-guard-no-such-program-xyz", "arg"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to start command"));
}

#[cfg(unix)]
#[test]
fn test_writes_json_report() {
    let home = TempDir::new().unwrap();
    let report = home.path().join("report.json");

    token_guard(&home)
        .arg("-q")
        .args(["-b", "100000", "-m", "gpt-4o"])
        .arg("-o")
        .arg(&report)
        .args(["--", "sh", "-c", "echo done"])
        .assert()
        .success();

    let content = fs::read_to_string(&report).unwrap();
    assert!(content.contains("\n  \"inputTokens\""));

    let json = read_report(&report);
    assert_eq!(json["model"], "gpt-4o");
    assert_eq!(json["command"], "sh -c echo done");
    assert_eq!(json["budgetExceeded"], false);
    assert_eq!(json["costExceeded"], false);
    assert!(json["outputTokens"].as_u64().unwrap() > 0);
    assert!(json["endTime"].is_string());
    assert_eq!(json["options"]["budget"], 100000);
    assert_eq!(json["options"]["quiet"], true);
    assert!(json["options"].get("costLimit").is_none());
}

#[cfg(unix)]
#[test]
fn test_budget_terminates_child() {
    let home = TempDir::new().unwrap();
    let report = home.path().join("report.json");
    let script = format!("printf '{}'; exec sleep 30", "word ".repeat(50));

    token_guard(&home)
        .args(["-q", "-b", "10", "-o"])
        .arg(&report)
        .args(["--", "sh", "-c", &script])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("Token budget exceeded"));

    let json = read_report(&report);
    assert_eq!(json["budgetExceeded"], true);
    assert_eq!(json["costExceeded"], false);
}

#[cfg(unix)]
#[test]
fn test_config_file_supplies_defaults() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join(".token-guard.json"),
        r#"{ "defaultBudget": 10, "warnPercent": 50 }"#,
    )
    .unwrap();
    let report = home.path().join("report.json");
    let script = format!("printf '{}'; exec sleep 30", "word ".repeat(50));

    token_guard(&home)
        .args(["-q", "-o"])
        .arg(&report)
        .args(["--", "sh", "-c", &script])
        .assert()
        .code(0);

    let json = read_report(&report);
    assert_eq!(json["budgetExceeded"], true);
    assert_eq!(json["options"]["budget"], 10);
    assert_eq!(json["options"]["warnPercent"], 50);
    assert!(fs::read_to_string(&report).unwrap().contains("\"warnPercent\": 50,"));
}

#[cfg(unix)]
#[test]
fn test_flags_override_config() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join(".token-guard.json"), r#"{ "defaultBudget": 10 }"#).unwrap();
    let report = home.path().join("report.json");

    token_guard(&home)
        .args(["-q", "-b", "1000000", "-o"])
        .arg(&report)
        .args(["--", "sh", "-c", "echo some words here"])
        .assert()
        .success();

    let json = read_report(&report);
    assert_eq!(json["budgetExceeded"], false);
    assert_eq!(json["options"]["budget"], 1000000);
}

#[cfg(unix)]
#[test]
fn test_malformed_config_is_ignored() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join(".token-guard.json"), "{ not json").unwrap();

    token_guard(&home)
        .args(["-q", "--", "sh", "-c", "echo fine"])
        .assert()
        .success()
        .stdout("fine\n");
}

#[cfg(unix)]
#[test]
fn test_report_write_failure_keeps_exit_code() {
    let home = TempDir::new().unwrap();
    let report = home.path().join("missing-dir").join("report.json");

    token_guard(&home)
        .arg("-q")
        .arg("-o")
        .arg(&report)
        .args(["--", "sh", "-c", "exit 4"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Failed to save report"));
}
