//! Smoke tests for the sensord binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A sensord command isolated from the user's config and log directories
fn sensord(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sensord").expect("binary should be built");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    sensord(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("logs"));
}

#[test]
fn test_demo_json_output() {
    let home = TempDir::new().unwrap();
    sensord(&home)
        .args(["demo", "--format", "json", "--groups", "1", "--devices", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("request-id"))
        .stdout(predicate::str::contains("group-1"))
        .stdout(predicate::str::contains("sensor-2"));
}

#[test]
fn test_demo_text_output() {
    let home = TempDir::new().unwrap();
    sensord(&home)
        .args(["demo", "--groups", "2", "--devices", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("group-2"))
        .stdout(predicate::str::contains("not available"));
}

#[test]
fn test_demo_reads_local_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join(".sensord.yml"),
        "simulation:\n  groups: 1\n  devices-per-group: 4\n  unread-devices: 0\n",
    )
    .unwrap();

    sensord(&home)
        .args(["demo", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sensor-4"))
        .stdout(predicate::str::contains("not-available").not());
}

#[test]
fn test_invalid_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    sensord(&home)
        .args(["demo", "--config", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_logs_after_demo() {
    let home = TempDir::new().unwrap();
    sensord(&home).args(["demo", "--groups", "1"]).assert().success();

    sensord(&home)
        .args(["logs", "--lines", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logging initialized"));
}
