//! End-to-end checks of argument and configuration handling. None of these
//! reach the network: every case exits before the pipeline starts.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::fixtures::write_config;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: get a Command for the originfinder binary, run from an empty
/// directory so no ambient ./config file is picked up.
fn originfinder(cwd: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("originfinder");
    cmd.current_dir(cwd.path()).env_remove("SHODAN_API_KEY").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_options() {
    let tmp = TempDir::new().unwrap();
    originfinder(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--shodan_api_key"))
        .stdout(predicate::str::contains("<DOMAIN>"));
}

#[test]
fn test_missing_domain_is_usage_error() {
    let tmp = TempDir::new().unwrap();
    originfinder(&tmp)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_invalid_domain_exits_one() {
    let tmp = TempDir::new().unwrap();
    originfinder(&tmp)
        .arg("bad..example.com")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid domain"));
}

#[test]
fn test_missing_config_file_exits_one() {
    let tmp = TempDir::new().unwrap();
    originfinder(&tmp)
        .args(["example.com", "--config", "does-not-exist.toml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_invalid_config_value_exits_one() {
    let tmp = TempDir::new().unwrap();
    let (_dir, path) = write_config("[recon]\nconcurrency = 500\n");
    originfinder(&tmp)
        .arg("example.com")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("recon.concurrency"));
}

#[test]
fn test_out_of_range_override_exits_one() {
    let tmp = TempDir::new().unwrap();
    originfinder(&tmp)
        .args(["example.com", "--concurrency", "0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid option"));
}

#[test]
fn test_bad_subdomain_label_exits_one() {
    let tmp = TempDir::new().unwrap();
    originfinder(&tmp)
        .args(["example.com", "--subdomains", "www,bad_label!"])
        .assert()
        .failure()
        .code(1);
}
