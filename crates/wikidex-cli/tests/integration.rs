//! Integration tests for the `wikidex` CLI.
//!
//! These exercise full command invocations against a temporary workspace.
//! Tests that would need a running Postgres/pgvector instance are marked
//! `#[ignore]`; tests that only touch the local label store (SQLite) and
//! configuration files run unattended.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

fn wikidex() -> Command {
    Command::cargo_bin("wikidex").expect("failed to find wikidex binary")
}

/// A tiny, well-formed dump: one Berlin-like item with a `head of
/// government` claim, and a scholar-article entity that should be
/// filtered out entirely (§8 E1 / E2).
fn write_sample_dump(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("sample_dump.json");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[").unwrap();
    writeln!(
        file,
        r#"{{"id":"P6","type":"property","labels":{{"en":{{"language":"en","value":"head of government"}}}},"descriptions":{{}},"claims":{{}}}},"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"id":"P31","type":"property","labels":{{"en":{{"language":"en","value":"instance of"}}}},"descriptions":{{}},"claims":{{}}}},"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"id":"Q6294","type":"item","labels":{{"en":{{"language":"en","value":"Michael Müller"}}}},"descriptions":{{}},"claims":{{}}}},"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"id":"Q64","type":"item","labels":{{"en":{{"language":"en","value":"Berlin"}}}},"descriptions":{{"en":{{"language":"en","value":"capital of Germany"}}}},"claims":{{"P6":[{{"mainsnak":{{"snaktype":"value","property":"P6","datatype":"wikibase-item","datavalue":{{"value":{{"entity-type":"item","id":"Q6294"}},"type":"wikibase-entityid"}}}}}}]}}}},"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"id":"Q999","type":"item","labels":{{"en":{{"language":"en","value":"Some Paper"}}}},"descriptions":{{}},"claims":{{"P31":[{{"mainsnak":{{"snaktype":"value","property":"P31","datatype":"wikibase-item","datavalue":{{"value":{{"entity-type":"item","id":"Q13442814"}},"type":"wikibase-entityid"}}}}}}]}}}}"#
    )
    .unwrap();
    writeln!(file, "]").unwrap();
    file.flush().unwrap();
    path
}

// ============================================================================
// build-labels
// ============================================================================

#[test]
fn test_build_labels_populates_sqlite_store() {
    let workspace = TempDir::new().unwrap();
    let dump = write_sample_dump(workspace.path());

    wikidex()
        .current_dir(workspace.path())
        .args(["build-labels", dump.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("records inserted"));

    assert!(workspace.path().join(".wikidex/labels.sqlite").exists());
}

#[test]
fn test_build_labels_reports_parse_errors() {
    let workspace = TempDir::new().unwrap();
    let dump = workspace.path().join("broken.json");
    let mut file = std::fs::File::create(&dump).unwrap();
    writeln!(file, "[").unwrap();
    writeln!(file, "not valid json,").unwrap();
    writeln!(
        file,
        r#"{{"id":"Q1","type":"item","labels":{{"en":{{"language":"en","value":"One"}}}},"descriptions":{{"en":{{"language":"en","value":"the first"}}}},"claims":{{}}}}"#
    )
    .unwrap();
    writeln!(file, "]").unwrap();
    file.flush().unwrap();

    wikidex()
        .current_dir(workspace.path())
        .args(["build-labels", dump.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("parse errors:      1"));
}

// ============================================================================
// status
// ============================================================================

#[test]
fn test_status_reports_unreachable_vectorstore_without_config() {
    let workspace = TempDir::new().unwrap();

    // No .wikidex/config.toml and no WIKIDEX_VECTORSTORE_CONNECTION_STRING,
    // so config validation itself fails before a store is ever contacted.
    wikidex()
        .current_dir(workspace.path())
        .env_remove("WIKIDEX_VECTORSTORE_CONNECTION_STRING")
        .args(["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
#[ignore = "requires a reachable Postgres/pgvector instance"]
fn test_status_reports_reachable_stores() {
    let workspace = TempDir::new().unwrap();
    let dump = write_sample_dump(workspace.path());

    wikidex()
        .current_dir(workspace.path())
        .args(["build-labels", dump.to_str().unwrap()])
        .assert()
        .success();

    wikidex()
        .current_dir(workspace.path())
        .env("WIKIDEX_VECTORSTORE_CONNECTION_STRING", "postgres://localhost/wikidex_test")
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reachable\":true"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_init_local_writes_file() {
    let workspace = TempDir::new().unwrap();

    wikidex()
        .current_dir(workspace.path())
        .args(["config", "init-local"])
        .assert()
        .success();

    assert!(workspace.path().join(".wikidex/config.toml").exists());
}

#[test]
fn test_config_show_after_init_local() {
    let workspace = TempDir::new().unwrap();

    wikidex()
        .current_dir(workspace.path())
        .args(["config", "init-local"])
        .assert()
        .success();

    wikidex()
        .current_dir(workspace.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[embedding]"))
        .stdout(predicate::str::contains("[vectorstore]"));
}

#[test]
fn test_config_paths_reports_local_path() {
    let workspace = TempDir::new().unwrap();

    wikidex()
        .current_dir(workspace.path())
        .args(["config", "paths"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".wikidex/config.toml"));
}

// ============================================================================
// ingest / ask (require external services; parsing-only here)
// ============================================================================

#[test]
#[ignore = "requires a reachable Postgres/pgvector instance and an embedding model"]
fn test_ingest_then_ask_roundtrip() {
    let workspace = TempDir::new().unwrap();
    let dump = write_sample_dump(workspace.path());

    wikidex()
        .current_dir(workspace.path())
        .args(["build-labels", dump.to_str().unwrap()])
        .assert()
        .success();

    wikidex()
        .current_dir(workspace.path())
        .env("WIKIDEX_VECTORSTORE_CONNECTION_STRING", "postgres://localhost/wikidex_test")
        .args(["ingest", dump.to_str().unwrap()])
        .assert()
        .success();

    wikidex()
        .current_dir(workspace.path())
        .env("WIKIDEX_VECTORSTORE_CONNECTION_STRING", "postgres://localhost/wikidex_test")
        .args(["ask", "Who is the head of government of Berlin?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Berlin").or(predicate::str::contains("do not know")));
}
