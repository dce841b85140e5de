//! Integration tests for the `keelson` binary.
//!
//! Fixtures are seeded through the library, then the CLI is driven with
//! `assert_cmd` against the same isolated data directory.

mod common;

use common::{TestEnv, grant, kanban, project, task, user};
use keelson::models::Permission;
use predicates::prelude::*;

/// Seed an owner, a reader without write access elsewhere, and a small board.
fn seeded() -> (TestEnv, i64, i64, i64) {
    let env = TestEnv::init();
    let storage = env.storage();
    let owner = user(&storage, "ana");
    let stranger = user(&storage, "bo");
    let source = project(&storage, "Launch", owner);
    kanban(&storage, source.id, &["Todo", "Done"], owner);
    task(&storage, source.id, "Write plan", owner);
    (env, owner, stranger, source.id)
}

fn parse(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn test_system_init_json() {
    let env = TestEnv::new();

    env.keelson()
        .args(["system", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""initialized":true"#));

    env.keelson()
        .args(["system", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""initialized":false"#));
}

#[test]
fn test_uninitialized_store_fails() {
    let env = TestEnv::new();

    env.keelson()
        .args(["project", "show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""error""#));
}

#[test]
fn test_project_show() {
    let (env, _, _, source) = seeded();

    let output = env
        .keelson()
        .args(["project", "show", &source.to_string()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = parse(&output.stdout);
    assert_eq!(json["project"]["title"], "Launch");
    assert_eq!(json["owner"]["username"], "ana");
    assert_eq!(json["task_count"], 1);
}

#[test]
fn test_duplicate_json() {
    let (env, owner, _, source) = seeded();

    let output = env
        .keelson()
        .args(["project", "duplicate", &source.to_string(), "--as", &owner.to_string()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = parse(&output.stdout);
    assert_eq!(json["project"]["project"]["title"], "Launch - duplicate");
    assert_ne!(json["project"]["project"]["id"], source);
    assert_eq!(json["project"]["task_count"], 1);
    assert_eq!(json["report"]["copied"]["task"], 1);
    assert_eq!(json["report"]["copied"]["bucket"], 2);
}

#[test]
fn test_duplicate_title_suffix_flag() {
    let (env, owner, _, source) = seeded();

    env.keelson()
        .args([
            "project",
            "duplicate",
            &source.to_string(),
            "--as",
            &owner.to_string(),
            "--title-suffix",
            " (copy)",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Launch (copy)"));
}

#[test]
fn test_duplicate_into_parent() {
    let (env, owner, _, source) = seeded();
    let parent = project(&env.storage(), "Archive", owner);

    let output = env
        .keelson()
        .args([
            "project",
            "duplicate",
            &source.to_string(),
            "--as",
            &owner.to_string(),
            "--parent",
            &parent.id.to_string(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = parse(&output.stdout);
    assert_eq!(json["project"]["project"]["parent_project_id"], parent.id);
}

#[test]
fn test_duplicate_access_denied() {
    let (env, _, stranger, source) = seeded();

    env.keelson()
        .args(["project", "duplicate", &source.to_string(), "--as", &stranger.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""error""#))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_duplicate_readonly_destination_denied() {
    let (env, owner, stranger, source) = seeded();
    let storage = env.storage();
    let destination = project(&storage, "Theirs", owner);
    grant(&storage, stranger, source, Permission::Read);
    grant(&storage, stranger, destination.id, Permission::Read);
    drop(storage);

    env.keelson()
        .args([
            "project",
            "duplicate",
            &source.to_string(),
            "--as",
            &stranger.to_string(),
            "--parent",
            &destination.id.to_string(),
        ])
        .assert()
        .failure();
}

#[test]
fn test_duplicate_human_output() {
    let (env, owner, _, source) = seeded();

    env.keelson()
        .args(["-H", "project", "duplicate", &source.to_string(), "--as", &owner.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Duplicated into project"))
        .stdout(predicate::str::contains("Launch - duplicate"));
}

#[test]
fn test_human_error_output() {
    let (env, owner, _, _) = seeded();

    env.keelson()
        .args(["-H", "project", "duplicate", "999", "--as", &owner.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn test_config_show_defaults() {
    let env = TestEnv::init();

    let output = env.keelson().args(["config", "show"]).output().unwrap();
    assert!(output.status.success());

    let json = parse(&output.stdout);
    assert_eq!(json["title_suffix"]["value"], " - duplicate");
    assert_eq!(json["title_suffix"]["source"], "default");
}

#[test]
fn test_invalid_config_is_reported() {
    let env = TestEnv::init();
    std::fs::write(env.data_path().join("config.kdl"), "share-token-length 4\n").unwrap();

    env.keelson()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("share-token-length"));
}
