use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn burrow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("burrow").unwrap();
    cmd.env("BURROW_DATA_DIR", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env_remove("BURROW_CONFIG")
        .env_remove("BURROW_CONTAINER_DIR")
        .env_remove("BURROW_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn seed(dir: &TempDir) {
    fs::write(
        dir.path().join("containers.json"),
        json!({
            "containerList": [
                {"id": "c1", "name": "First", "type": "lxc", "distro": "bionic",
                 "installStatus": "ready", "installedApps": []},
                {"id": "c2", "name": "Second", "type": "lxc", "distro": "focal",
                 "installStatus": "ready", "installedApps": [],
                 "extraArchives": [{"archiveName": "ppa:team/tools", "archiveStatus": "installed"}]}
            ],
            "defaultContainer": "c1"
        })
        .to_string(),
    )
    .unwrap();
}

#[test]
fn test_list_empty_registry() {
    let dir = TempDir::new().unwrap();
    burrow(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No containers defined"));
}

#[test]
fn test_list_seeded_registry() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    burrow(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("* c1"))
        .stdout(predicate::str::contains("Second"));
}

#[test]
fn test_unknown_container_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    burrow(&dir)
        .args(["info", "--id", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Container id 'nope' does not exist."));
}

#[test]
fn test_info_defaults_to_default_container() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    burrow(&dir)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Container c1 (default)"));
}

#[test]
fn test_info_json_lists_archives() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    let output = burrow(&dir)
        .args(["info", "--id", "c2", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["id"], "c2");
    assert_eq!(value["multiarch"], "disabled");
    assert_eq!(value["archives"][0]["archiveName"], "ppa:team/tools");
}

#[test]
fn test_set_default_persists() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    burrow(&dir).args(["set-default", "c2"]).assert().success();

    let text = fs::read_to_string(dir.path().join("containers.json")).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["defaultContainer"], "c2");
    assert!(text.ends_with("}\n"));
    assert!(text.contains("\n    \"containerList\": ["));
}

#[test]
fn test_set_default_unknown_fails() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    burrow(&dir)
        .args(["set-default", "ghost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'ghost' does not exist"));
}

#[test]
fn test_clear_default() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    burrow(&dir).arg("clear-default").assert().success();
    burrow(&dir)
        .arg("info")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no default container"));
}

#[test]
fn test_merge_registry_file() {
    let dir = TempDir::new().unwrap();
    seed(&dir);
    let other = dir.path().join("other.json");
    fs::write(
        &other,
        json!({"containerList": [{"id": "c3", "name": "Third", "type": "lxc", "distro": "jammy"}]})
            .to_string(),
    )
    .unwrap();

    burrow(&dir).arg("merge").arg(&other).assert().success();
    burrow(&dir)
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"c3\""));
}

#[test]
fn test_malformed_registry_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("containers.json"), "{ not json").unwrap();
    burrow(&dir)
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn test_create_requires_password() {
    let dir = TempDir::new().unwrap();
    burrow(&dir)
        .args(["create", "--id", "c1", "--distro", "bionic"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("password is required"));
    assert!(!dir.path().join("containers.json").exists());
}

#[test]
fn test_create_rejects_empty_password_on_stdin() {
    let dir = TempDir::new().unwrap();
    burrow(&dir)
        .args(["create", "--id", "c1", "--distro", "bionic", "--password-stdin"])
        .write_stdin("\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("password is required"));
    assert!(!dir.path().join("containers.json").exists());
}

#[test]
fn test_password_flag_is_not_accepted() {
    let dir = TempDir::new().unwrap();
    burrow(&dir)
        .args(["create", "--id", "c1", "--distro", "bionic", "--password", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password"));
}
