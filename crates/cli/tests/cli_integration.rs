//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `testdeck` binary and verify exit codes,
//! stdout content, and stderr content. Tests run from the workspace root so
//! the fixture paths resolve.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `testdeck` binary, rooted at workspace.
fn testdeck() -> Command {
    let mut cmd = cargo_bin_cmd!("testdeck");
    cmd.current_dir(workspace_root());
    cmd.env_remove("TESTDECK_PORT").env_remove("TESTDECK_LOG");
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    testdeck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test execution tracking server"))
        .stdout(predicate::str::contains("check-seed"));
}

#[test]
fn version_exits_0() {
    testdeck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("testdeck"));
}

#[test]
fn unknown_subcommand_fails() {
    testdeck().arg("frobnicate").assert().failure();
}

// ──────────────────────────────────────────────
// 2. check-seed
// ──────────────────────────────────────────────

#[test]
fn check_seed_accepts_demo_fixture() {
    testdeck()
        .args(["check-seed", "fixtures/demo-seed.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "2 users, 1 projects, 1 packages, 3 scenarios, 4 steps",
        ));
}

#[test]
fn check_seed_lists_every_problem() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        r#"{
            "projects": [{"id": "p", "name": "P"}],
            "packages": [{"id": "pkg", "projectId": "missing", "name": "X"}],
            "scenarios": [
                {"id": "s", "projectId": "p", "packageId": "nowhere", "title": "T"},
                {"id": "s", "projectId": "p", "title": "Dup"}
            ]
        }"#,
    )
    .unwrap();

    testdeck()
        .arg("check-seed")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project 'missing'"))
        .stderr(predicate::str::contains("unknown package 'nowhere'"))
        .stderr(predicate::str::contains("duplicate scenario id 's'"));
}

#[test]
fn check_seed_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"users\": [").unwrap();

    testdeck()
        .arg("check-seed")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

#[test]
fn check_seed_missing_file_fails() {
    testdeck()
        .args(["check-seed", "fixtures/does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

// ──────────────────────────────────────────────
// 3. Configuration
// ──────────────────────────────────────────────

#[test]
fn bad_config_file_fails_before_running() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("testdeck.toml");
    fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

    testdeck()
        .arg("--config")
        .arg(&path)
        .args(["check-seed", "fixtures/demo-seed.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

#[test]
fn bad_port_env_fails() {
    testdeck()
        .env("TESTDECK_PORT", "eighty")
        .args(["check-seed", "fixtures/demo-seed.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TESTDECK_PORT"));
}

#[test]
fn sample_config_is_accepted() {
    testdeck()
        .args(["--config", "fixtures/testdeck.toml"])
        .args(["check-seed", "fixtures/demo-seed.json"])
        .assert()
        .success();
}
