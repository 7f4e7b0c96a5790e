//! Ownership-aware cleanup of the lock-file fallback: only the process that
//! created the namespace removes it, and only once nobody holds the claim.
#![cfg(unix)]

use assert_cmd::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use wait_timeout::ChildExt;

fn spawn_holder(root: &Path) -> Child {
    let mut child = Command::cargo_bin("singleton")
        .expect("binary")
        .env("SINGLETON_DIR", root)
        .env("NO_COLOR", "1")
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn singleton run");

    // Block until the verdict is printed so the claim is known to be in place.
    let stdout = child.stdout.take().expect("piped stdout");
    for line in BufReader::new(stdout).lines() {
        if line.expect("read line").starts_with("-->") {
            break;
        }
    }
    child
}

fn dismiss(mut child: Child) {
    drop(child.stdin.take());
    let status = child
        .wait_timeout(Duration::from_secs(10))
        .expect("wait")
        .expect("exited in time");
    assert!(status.success());
}

#[test]
fn namespace_removed_after_owner_exits() {
    let tmp = TempDir::new().expect("tmpdir");
    let ns_dir = tmp.path().join("3-Boundary").join("3-Namespace");

    let owner = spawn_holder(tmp.path());
    assert!(ns_dir.join("Singleton.lock").exists());

    dismiss(owner);

    assert!(!ns_dir.exists(), "namespace still present after owner exit");
    // The boundary directory is shared and stays.
    assert!(tmp.path().join("3-Boundary").exists());
}

#[test]
fn opener_exit_leaves_owner_claim_intact() {
    let tmp = TempDir::new().expect("tmpdir");
    let ns_dir = tmp.path().join("3-Boundary").join("3-Namespace");

    let owner = spawn_holder(tmp.path());
    let opener = spawn_holder(tmp.path());

    dismiss(opener);
    assert!(ns_dir.join("Singleton.lock").exists());

    // The owner is still alive, so a newcomer must still lose.
    Command::cargo_bin("singleton")
        .expect("binary")
        .env("SINGLETON_DIR", tmp.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicates::str::contains("Another instance of Singleton is running:"));

    dismiss(owner);
    assert!(!ns_dir.exists());
}
