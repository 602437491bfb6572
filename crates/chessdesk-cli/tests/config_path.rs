use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("chessdesk")
        .env("CHESSDESK_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("chessdesk")
        .env("CHESSDESK_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("[stream]"));
    assert!(contents.contains("rate_limit_backoff_secs"));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("chessdesk")
        .env("CHESSDESK_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

/// A home whose config keeps the token in `credentials.json`, away from the
/// real credential store.
fn file_store_home() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[auth]\ntoken_store = \"file\"\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_status_without_token() {
    let dir = file_store_home();

    cargo_bin_cmd!("chessdesk")
        .env("CHESSDESK_HOME", dir.path())
        .env_remove("CHESSDESK_TOKEN")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_logout_without_token() {
    let dir = file_store_home();

    cargo_bin_cmd!("chessdesk")
        .env("CHESSDESK_HOME", dir.path())
        .env_remove("CHESSDESK_TOKEN")
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_logout_clears_file_token_and_warns_about_env_token() {
    let dir = file_store_home();
    let credentials = dir.path().join("credentials.json");
    fs::write(
        &credentials,
        r#"{"chessdesk/lichess-access-token":"lip_stored"}"#,
    )
    .unwrap();

    cargo_bin_cmd!("chessdesk")
        .env("CHESSDESK_HOME", dir.path())
        .env("CHESSDESK_TOKEN", "lip_from_env")
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out."))
        .stdout(predicate::str::contains("CHESSDESK_TOKEN is still set"));

    let contents = fs::read_to_string(&credentials).unwrap();
    assert!(!contents.contains("lip_stored"));
}
