//! Binary-level tests for the callscope CLI

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::helpers::three_segment_transcript;

/// Command isolated from the user's home and API credentials.
fn callscope(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("callscope").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("RUST_LOG")
        .env_remove("ANTHROPIC_API_KEY");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    callscope(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("chunk"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn chunk_previews_segments() {
    let home = TempDir::new().unwrap();
    let transcript = home.path().join("acme-pov.txt");
    fs::write(&transcript, three_segment_transcript()).unwrap();

    callscope(&home)
        .args(["chunk", "--max-tokens", "120", "--overlap", "50"])
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicate::str::contains("acme-pov: 3 chunks"))
        .stdout(predicate::str::contains("[3/3]"))
        .stdout(predicate::str::contains("(final)"));
}

#[test]
fn config_show_prints_toml() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.toml");
    fs::write(&path, "[analysis]\nmax_retries = 7\n").unwrap();

    callscope(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[analysis]"))
        .stdout(predicate::str::contains("max_retries = 7"));
}

#[test]
fn config_init_refuses_second_write() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("conf").join("config.toml");

    callscope(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    assert!(path.exists());

    callscope(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    callscope(&home)
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn analyze_rejects_unsupported_extension() {
    let home = TempDir::new().unwrap();
    let transcript = home.path().join("call.pdf");
    fs::write(&transcript, "Discovery call").unwrap();

    callscope(&home)
        .arg("analyze")
        .arg(&transcript)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported transcript"));
}

#[test]
fn analyze_without_api_key_fails_before_any_request() {
    let home = TempDir::new().unwrap();
    let transcript = home.path().join("call.txt");
    fs::write(&transcript, "Initial discovery call with Acme.").unwrap();

    callscope(&home)
        .arg("analyze")
        .arg(&transcript)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to set up the model backend"))
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}

#[test]
fn analyze_requires_files() {
    let home = TempDir::new().unwrap();
    callscope(&home).arg("analyze").assert().failure();
}

#[test]
fn completions_generate_for_bash() {
    let home = TempDir::new().unwrap();
    callscope(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("callscope"));
}
