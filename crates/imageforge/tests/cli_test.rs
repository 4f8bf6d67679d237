#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn forge() -> Command {
    let mut cmd = Command::cargo_bin("forge").unwrap();
    cmd.env_remove("GRIDSCALE_UUID")
        .env_remove("GRIDSCALE_TOKEN")
        .env_remove("GRIDSCALE_URL");
    cmd
}

/// Help lists every subcommand
#[test]
fn test_cli_help() {
    forge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_cli_version() {
    forge()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("imageforge"));
}

#[test]
fn test_build_help() {
    forge()
        .arg("build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("<CONFIG>"))
        .stdout(predicate::str::contains("--debug"))
        .stdout(predicate::str::contains("--cancel-after-secs"));
}

/// A complete file validates and is summarised
#[test]
fn test_validate_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.kdl");
    fs::write(
        &path,
        r#"
image "base" {
    credentials {
        api-key "user-uuid"
        api-token "secret"
    }
    server {
        name "builder"
        cores 2
        memory 4
        storage-capacity 10
        template-uuid "tpl-uuid"
    }
    template-name "base-2024"
    provision {
        shell "apt-get update"
    }
}
"#,
    )
    .unwrap();

    forge()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("base-2024"))
        .stdout(predicate::str::contains("shell: apt-get update"));
}

/// Every validation problem is reported at once
#[test]
fn test_validate_reports_all_problems() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.kdl");
    fs::write(&path, r#"image "broken" { server { cores 2 } }"#).unwrap();

    forge()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("api-token must be specified"))
        .stderr(predicate::str::contains("api-key must be specified"))
        .stderr(predicate::str::contains("template-uuid must be specified"))
        .stderr(predicate::str::contains("memory must be greater than 0"));
}

#[test]
fn test_validate_missing_file() {
    forge()
        .arg("validate")
        .arg("/nonexistent/image.kdl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error reading"));
}

/// Destroy needs credentials from the environment
#[test]
fn test_destroy_without_credentials() {
    forge()
        .arg("destroy")
        .arg("tpl-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GRIDSCALE"));
}
