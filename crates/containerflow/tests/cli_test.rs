#![allow(deprecated)] // TODO: move cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const CONTAINER_FILE: &str = r#"
container "api" {
    name "api"
    memory 512
    image {
        url "cr.yandex/crp/api:1.0"
    }
}
"#;

/// `cflow` run inside `dir` with no access to the real home directory
fn cflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cflow").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("CONTAINERFLOW_CONFIG_PATH")
        .env_remove("CONTAINERFLOW_FOLDER_ID")
        .env_remove("CONTAINERFLOW_ENDPOINT")
        .env_remove("YC_TOKEN")
        .env("NO_COLOR", "1");
    cmd
}

fn project(content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("container.kdl"), content).unwrap();
    dir
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    cflow(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    cflow(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("containerflow"));
}

#[test]
fn test_validate_with_default_folder() {
    let dir = project(CONTAINER_FILE);
    cflow(dir.path())
        .env("CONTAINERFLOW_FOLDER_ID", "b1gfolder")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"))
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn test_validate_without_folder_fails() {
    let dir = project(CONTAINER_FILE);
    cflow(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no folder_id"));
}

#[test]
fn test_validate_rejects_bad_log_destination() {
    let dir = project(
        r#"
container "api" {
    memory 512
    folder_id "b1gfolder"
    image {
        url "cr.yandex/crp/api:1.0"
    }
    log_options {
        log_group_id "e23group"
        folder_id "b1gfolder"
    }
}
"#,
    );
    cflow(dir.path()).arg("validate").assert().failure();
}

#[test]
fn test_missing_container_file() {
    let dir = TempDir::new().unwrap();
    cflow(dir.path()).arg("plan").assert().failure();
}

#[test]
fn test_plan_needs_no_credentials() {
    let dir = project(CONTAINER_FILE);
    cflow(dir.path())
        .env("CONTAINERFLOW_FOLDER_ID", "b1gfolder")
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"))
        .stdout(predicate::str::contains("create"));
}

#[test]
fn test_apply_without_yes_stops_at_plan() {
    let dir = project(CONTAINER_FILE);
    cflow(dir.path())
        .env("CONTAINERFLOW_FOLDER_ID", "b1gfolder")
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));

    assert!(!dir.path().join(".containerflow/lock.json").exists());
}

#[test]
fn test_show_empty_state() {
    let dir = project(CONTAINER_FILE);
    cflow(dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tracked containers"));
}

#[test]
fn test_destroy_untracked_key() {
    let dir = project(CONTAINER_FILE);
    cflow(dir.path())
        .args(["destroy", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not tracked"));
}
