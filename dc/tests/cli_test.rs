//! End-to-end tests for the `dc` binary

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `dc` isolated from the user's config and data directories
fn dc(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dc"));
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG");
    cmd
}

fn groups_file(home: &Path) -> PathBuf {
    home.join("groups.json")
}

#[test]
fn test_groups_add_list_remove() {
    let home = TempDir::new().unwrap();
    let file = groups_file(home.path());

    dc(home.path())
        .args(["groups", "add", "@living", "192.168.1.10/013001", "192.168.1.11/029101"])
        .arg("--groups-file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 2 device(s) to @living"));
    assert!(file.exists());

    dc(home.path())
        .args(["groups", "list"])
        .arg("--groups-file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("@living: 192.168.1.10/013001, 192.168.1.11/029101"));

    dc(home.path())
        .args(["groups", "remove", "@living", "192.168.1.10/013001"])
        .arg("--groups-file")
        .arg(&file)
        .assert()
        .success();

    let output = dc(home.path())
        .args(["groups", "list", "@living", "--format", "json"])
        .arg("--groups-file")
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed[0]["group"], "@living");
    assert_eq!(listed[0]["devices"], serde_json::json!(["192.168.1.11/029101"]));
}

#[test]
fn test_groups_delete() {
    let home = TempDir::new().unwrap();
    let file = groups_file(home.path());

    dc(home.path())
        .args(["groups", "add", "@attic", "192.168.1.20/013001", "--groups-file"])
        .arg(&file)
        .assert()
        .success();
    dc(home.path())
        .args(["groups", "delete", "@attic", "--groups-file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted @attic"));
    dc(home.path())
        .args(["groups", "list", "--groups-file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("No groups"));
}

#[test]
fn test_invalid_group_name_rejected() {
    let home = TempDir::new().unwrap();
    let file = groups_file(home.path());

    dc(home.path())
        .args(["groups", "add", "living", "192.168.1.10/013001", "--groups-file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid group name"));
    assert!(!file.exists());
}

#[test]
fn test_remove_from_missing_group() {
    let home = TempDir::new().unwrap();

    dc(home.path())
        .args(["groups", "remove", "@ghost", "192.168.1.10/013001", "--groups-file"])
        .arg(groups_file(home.path()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Group not found: @ghost"));
}

#[test]
fn test_groups_file_from_config() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("from-config.json");
    let config = home.path().join("dc.yml");
    std::fs::write(&config, format!("storage:\n  groups-file: {}\n", file.display())).unwrap();

    dc(home.path())
        .arg("--config")
        .arg(&config)
        .args(["groups", "add", "@cfg", "192.168.1.30/013001"])
        .assert()
        .success();
    assert!(file.exists());
}

#[test]
fn test_monitor_reports_sample() {
    let home = TempDir::new().unwrap();

    let output = dc(home.path())
        .args(["monitor", "--seconds", "1", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["alive-tasks"].is_u64());
    assert_eq!(report["active-updates"], 0);
    assert_eq!(report["queues"][0]["name"], "notifications");
    assert!(home.path().join("data/devicecoord/logs/devicecoord.log").exists());
}

#[test]
fn test_missing_explicit_config_fails() {
    let home = TempDir::new().unwrap();

    dc(home.path())
        .args(["--config", "does-not-exist.yml", "groups", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
