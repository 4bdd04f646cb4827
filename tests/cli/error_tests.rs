use super::common::{client, config_file};
use predicates::prelude::*;

#[test]
fn malformed_variable_is_rejected_by_argument_parsing() {
    let config = config_file("");
    client(&config)
        .args(["run", "loop", "--var", "x1=abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid variable value"));
}

#[test]
fn history_without_user_fails_before_any_request() {
    let config = config_file("");
    client(&config)
        .arg("history")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user configured"));
}

#[test]
fn non_positive_credit_charge_is_rejected() {
    let config = config_file("");
    client(&config)
        .args(["credits", "--add", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("positive amount"));
}

#[test]
fn unknown_config_key_is_reported() {
    let config = config_file("colour = true\n");
    client(&config)
        .arg("users")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn unreachable_server_is_a_failure() {
    let config = config_file("[server]\nconnect_timeout_ms = 500\n");
    client(&config).arg("users").assert().failure();
}

#[test]
fn upload_of_missing_file_fails_before_any_request() {
    let config = config_file("");
    client(&config)
        .args(["upload", "/nonexistent/program.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
