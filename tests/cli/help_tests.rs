use super::common::{client, config_file};
use predicates::prelude::*;

#[test]
fn top_level_help_lists_commands() {
    let config = config_file("");
    client(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("run")
                .and(predicate::str::contains("debug"))
                .and(predicate::str::contains("rerun"))
                .and(predicate::str::contains("credits"))
                .and(predicate::str::contains("watch")),
        );
}

#[test]
fn run_help_documents_variables() {
    let config = config_file("");
    client(&config)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--var").and(predicate::str::contains("--arch")));
}

#[test]
fn version_flag() {
    let config = config_file("");
    client(&config)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn show_and_upload_are_listed() {
    let config = config_file("");
    client(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload").and(predicate::str::contains("show")));
    client(&config)
        .args(["show", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--lineage").and(predicate::str::contains("--level")));
}

#[test]
fn debug_help_documents_breakpoint_list() {
    let config = config_file("");
    client(&config)
        .args(["debug", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--breakpoints"));
}
