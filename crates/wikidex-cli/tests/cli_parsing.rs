//! CLI parsing tests for the `wikidex` binary.
//!
//! These only exercise clap's argument parsing (via `--help`/failure paths)
//! and never touch a real label store, vector store, or model.

use assert_cmd::Command;
use predicates::prelude::*;

fn wikidex() -> Command {
    Command::cargo_bin("wikidex").expect("failed to find wikidex binary")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_shows_all_commands() {
    wikidex()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build-labels"))
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    wikidex()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wikidex"));
}

// ============================================================================
// Global Options Tests
// ============================================================================

#[test]
fn test_global_options_in_help() {
    wikidex()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--quiet"))
        .stdout(predicate::str::contains("--vectorstore-connection-string"))
        .stdout(predicate::str::contains("--embedding-provider"));
}

#[test]
fn test_conflicting_verbose_quiet_not_prevented() {
    // clap doesn't prevent both by default; our code just prefers quiet.
    wikidex()
        .args(["--verbose", "--quiet", "--help"])
        .assert()
        .success();
}

// ============================================================================
// build-labels Command Tests
// ============================================================================

#[test]
fn test_build_labels_requires_dump_path() {
    wikidex()
        .args(["build-labels"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_build_labels_help() {
    wikidex()
        .args(["build-labels", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dump"));
}

// ============================================================================
// ingest Command Tests
// ============================================================================

#[test]
fn test_ingest_requires_dump_path() {
    wikidex()
        .args(["ingest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_ingest_help() {
    wikidex()
        .args(["ingest", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dump"));
}

// ============================================================================
// ask Command Tests
// ============================================================================

#[test]
fn test_ask_query_is_optional() {
    // The positional query is optional (absent => REPL mode), so --help
    // must still succeed without a query argument.
    wikidex().args(["ask", "--help"]).assert().success();
}

// ============================================================================
// status Command Tests
// ============================================================================

#[test]
fn test_status_help() {
    wikidex()
        .args(["status", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--show-config"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// config Command Tests
// ============================================================================

#[test]
fn test_config_help() {
    wikidex()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("init-global"))
        .stdout(predicate::str::contains("init-local"))
        .stdout(predicate::str::contains("paths"));
}

#[test]
fn test_config_show_help() {
    wikidex().args(["config", "show", "--help"]).assert().success();
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_unknown_command() {
    wikidex()
        .args(["nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized"));
}

#[test]
fn test_unknown_option() {
    wikidex()
        .args(["--nonexistent-option"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected"));
}
