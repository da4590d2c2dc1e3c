//! End-to-end runs of the `herald` binary against fixture documents.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn herald() -> Command {
    let mut cmd = Command::cargo_bin("herald").unwrap();
    cmd.env_remove("HERALD_CONFIG").env_remove("HERALD_TEMPLATES");
    cmd
}

fn apply_add(out_dir: &std::path::Path) -> Command {
    let mut cmd = herald();
    cmd.arg("apply")
        .arg("--rules")
        .arg(fixture("rule-groups.yaml"))
        .arg("--routing")
        .arg(fixture("routing.yaml"))
        .args(["--action", "add"])
        .arg("--rule")
        .arg(fixture("rule.yaml"))
        .arg("--channels")
        .arg(fixture("channels.yaml"))
        .arg("--out-dir")
        .arg(out_dir);
    cmd
}

#[test]
fn templates_lists_catalog() {
    herald()
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::contains("containers.container.restartCount"));
}

#[test]
fn list_empty_documents() {
    herald()
        .arg("list")
        .arg("--rules")
        .arg(fixture("rule-groups.yaml"))
        .arg("--routing")
        .arg(fixture("routing.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No alert rules in team-a"));
}

#[test]
fn apply_then_list_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");

    apply_add(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Alert rule 'api-restarts' added in team-a"));

    let routing = std::fs::read_to_string(out_dir.join("routing.yaml")).unwrap();
    assert!(routing.contains("ops-id-2"));
    assert!(routing.contains("mail-id-3"));
    let secrets = std::fs::read_to_string(out_dir.join("email-secrets.yaml")).unwrap();
    assert!(secrets.contains("hunter2"));

    herald()
        .args(["--format", "json", "list"])
        .arg("--rules")
        .arg(out_dir.join("rule-groups.yaml"))
        .arg("--routing")
        .arg(out_dir.join("routing.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "api-restarts""#))
        .stdout(predicate::str::contains(r#""tplLost": false"#));
}

#[test]
fn apply_delete_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let added = dir.path().join("added");
    let deleted = dir.path().join("deleted");
    apply_add(&added).assert().success();

    herald()
        .arg("apply")
        .arg("--rules")
        .arg(added.join("rule-groups.yaml"))
        .arg("--routing")
        .arg(added.join("routing.yaml"))
        .args(["--action", "delete", "--name", "api-restarts"])
        .arg("--channels")
        .arg(fixture("channels.yaml"))
        .arg("--out-dir")
        .arg(&deleted)
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"));

    let groups = std::fs::read_to_string(deleted.join("rule-groups.yaml")).unwrap();
    assert!(!groups.contains("api-restarts"));
}

#[test]
fn apply_twice_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    apply_add(&first).assert().success();

    herald()
        .arg("apply")
        .arg("--rules")
        .arg(first.join("rule-groups.yaml"))
        .arg("--routing")
        .arg(first.join("routing.yaml"))
        .args(["--action", "add"])
        .arg("--rule")
        .arg(fixture("rule.yaml"))
        .arg("--channels")
        .arg(fixture("channels.yaml"))
        .arg("--out-dir")
        .arg(dir.path().join("second"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert!(!dir.path().join("second").exists());
}

#[test]
fn channel_check_accepts_webhook() {
    herald()
        .args(["channel", "check"])
        .arg(fixture("webhook-channel.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ops-id-2"));
}

#[test]
fn channel_check_rejects_foreign_dingtalk_host() {
    herald()
        .args(["channel", "check"])
        .arg(fixture("bad-dingding-channel.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
