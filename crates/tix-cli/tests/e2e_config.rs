//! E2E CLI tests covering configuration:
//! - `branch` from the user config file
//! - the global `--branch` override
//! - `TIX_DIR` placement of local state
//! - malformed config files
//!
//! Linux only: the config file is located through `XDG_CONFIG_HOME`.

#![cfg(target_os = "linux")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) -> std::process::Output {
    std::process::Command::new("git")
        .current_dir(dir)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env_remove("GIT_INDEX_FILE")
        .output()
        .expect("git should run")
}

fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).expect("repo dir");
    let steps: [&[&str]; 6] = [
        &["init", "-q"],
        &["symbolic-ref", "HEAD", "refs/heads/main"],
        &["config", "user.email", "dev@example.com"],
        &["config", "user.name", "Dev"],
        &["config", "commit.gpgsign", "false"],
        &["commit", "-q", "--allow-empty", "-m", "initial"],
    ];
    for args in steps {
        assert!(git(dir, args).status.success(), "git {args:?} failed");
    }
}

fn branch_exists(dir: &Path, branch: &str) -> bool {
    git(dir, &["rev-parse", "--verify", "-q", &format!("refs/heads/{branch}")])
        .status
        .success()
}

fn ti_cmd(tmp: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ti"));
    cmd.current_dir(tmp.path().join("repo"));
    cmd.env("TIX_LOG", "error");
    cmd.env("TIX_DIR", tmp.path().join("state"));
    cmd.env("XDG_CONFIG_HOME", tmp.path().join("config"));
    cmd.env_remove("TIX_FORMAT");
    cmd.env_remove("GIT_WORKING_DIR");
    cmd
}

fn write_config(tmp: &TempDir, body: &str) {
    let dir = tmp.path().join("config/tix");
    std::fs::create_dir_all(&dir).expect("config dir");
    std::fs::write(dir.join("config.toml"), body).expect("config file");
}

fn setup() -> Option<TempDir> {
    if !git_available() {
        eprintln!("skipping: git not available");
        return None;
    }
    let tmp = TempDir::new().expect("tempdir");
    init_repo(&tmp.path().join("repo"));
    Some(tmp)
}

#[test]
fn config_file_selects_branch() {
    let Some(tmp) = setup() else { return };
    write_config(&tmp, "branch = \"tickets\"\n");

    ti_cmd(&tmp)
        .args(["new", "--title", "Configured", "--json"])
        .assert()
        .success();

    let repo = tmp.path().join("repo");
    assert!(branch_exists(&repo, "tickets"));
    assert!(!branch_exists(&repo, "ticgit"));
}

#[test]
fn branch_flag_overrides_config() {
    let Some(tmp) = setup() else { return };
    write_config(&tmp, "branch = \"tickets\"\n");

    ti_cmd(&tmp)
        .args(["--branch", "bugs", "new", "--title", "Elsewhere", "--json"])
        .assert()
        .success();

    let repo = tmp.path().join("repo");
    assert!(branch_exists(&repo, "bugs"));
    assert!(!branch_exists(&repo, "tickets"));

    // The configured branch has no tickets yet.
    ti_cmd(&tmp)
        .args(["list", "--format", "text"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn local_state_lives_under_tix_dir() {
    let Some(tmp) = setup() else { return };

    ti_cmd(&tmp)
        .args(["new", "--title", "Stateful", "--json"])
        .assert()
        .success();

    let state_root = tmp.path().join("state");
    let repo_dirs: Vec<_> = std::fs::read_dir(&state_root)
        .expect("tix dir created")
        .filter_map(Result::ok)
        .collect();
    assert_eq!(repo_dirs.len(), 1);
    assert!(repo_dirs[0].path().join("state.json").is_file());
}

#[test]
fn malformed_config_is_reported() {
    let Some(tmp) = setup() else { return };
    write_config(&tmp, "branch = [\n");

    ti_cmd(&tmp)
        .args(["list", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}
