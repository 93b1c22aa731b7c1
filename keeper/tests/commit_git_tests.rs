//! Committer tests against real git repositories
//!
//! Each test builds a local bare remote in a temp directory. Tests return
//! early when no `git` binary is available.

use keeper::services::git::{GitRepository, Repository};
use keeper::services::lfs;
use keeper::types::CommitOutcome;
use keeper::{Committer, CommitterConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git").args(args).current_dir(dir).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Bare remote whose default branch is `main`
fn bare_remote(root: &Path) -> PathBuf {
    let remote = root.join("remote.git");
    fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--bare", "--quiet"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    remote
}

fn clone(remote: &Path, dest: &Path) -> PathBuf {
    let parent = dest.parent().unwrap();
    git(
        parent,
        &["clone", "--quiet", remote.to_str().unwrap(), dest.to_str().unwrap()],
    );
    git(dest, &["config", "commit.gpgsign", "false"]);
    dest.to_path_buf()
}

fn committer(work: &Path) -> Committer<GitRepository> {
    let mut config = CommitterConfig::new(work);
    config.retry_delay = Duration::ZERO;
    Committer::new(GitRepository::new(work), config)
}

fn write_snapshot(work: &Path, service: &str, content: &str) {
    let dir = work.join("data").join(service);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("server.properties"), content).unwrap();
}

fn remote_files(remote: &Path) -> Vec<String> {
    git(remote, &["ls-tree", "-r", "--name-only", "main"])
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_second_commit_without_changes_is_a_no_op() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let root = TempDir::new().unwrap();
    let remote = bare_remote(root.path());
    let work = clone(&remote, &root.path().join("work"));
    write_snapshot(&work, "mc", "motd=first\n");

    let committer = committer(&work);
    let first = committer.commit_and_push(Some("first snapshot")).await.unwrap();
    let second = committer.commit_and_push(None).await.unwrap();

    assert_eq!(
        first,
        CommitOutcome::Pushed {
            attempts: 1,
            remediated: false
        }
    );
    assert_eq!(second, CommitOutcome::NoChanges);
    assert_eq!(remote_files(&remote), vec!["data/mc/server.properties"]);
}

#[tokio::test]
async fn test_deleted_snapshot_files_are_committed() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let root = TempDir::new().unwrap();
    let remote = bare_remote(root.path());
    let work = clone(&remote, &root.path().join("work"));
    write_snapshot(&work, "mc", "motd=first\n");
    write_snapshot(&work, "retired", "motd=bye\n");

    let committer = committer(&work);
    committer.commit_and_push(None).await.unwrap();
    fs::remove_dir_all(work.join("data/retired")).unwrap();
    let outcome = committer.commit_and_push(None).await.unwrap();

    assert!(matches!(outcome, CommitOutcome::Pushed { .. }));
    assert_eq!(remote_files(&remote), vec!["data/mc/server.properties"]);
}

#[tokio::test]
async fn test_concurrent_pushers_self_heal() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let root = TempDir::new().unwrap();
    let remote = bare_remote(root.path());

    let first = clone(&remote, &root.path().join("first"));
    write_snapshot(&first, "mc", "motd=seed\n");
    committer(&first).commit_and_push(Some("seed")).await.unwrap();

    // both clones start from the same remote state
    let second = clone(&remote, &root.path().join("second"));

    write_snapshot(&first, "mc", "motd=from first host\n");
    let first_outcome = committer(&first).commit_and_push(None).await.unwrap();

    write_snapshot(&second, "factorio", "seed=42\n");
    let second_outcome = committer(&second).commit_and_push(None).await.unwrap();

    assert_eq!(
        first_outcome,
        CommitOutcome::Pushed {
            attempts: 1,
            remediated: false
        }
    );
    assert_eq!(
        second_outcome,
        CommitOutcome::Pushed {
            attempts: 2,
            remediated: false
        }
    );
    assert_eq!(
        remote_files(&remote),
        vec!["data/factorio/server.properties", "data/mc/server.properties"]
    );
}

#[tokio::test]
async fn test_undo_of_a_root_commit_keeps_changes_staged() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let root = TempDir::new().unwrap();
    let work = root.path().join("work");
    fs::create_dir_all(&work).unwrap();
    git(&work, &["init", "--quiet"]);
    git(&work, &["config", "commit.gpgsign", "false"]);
    write_snapshot(&work, "mc", "motd=hello\n");

    let repo = GitRepository::new(&work);
    repo.configure_identity("test", "test@example.invalid").await.unwrap();
    repo.stage(&[PathBuf::from("data")]).await.unwrap();
    repo.commit("root").await.unwrap();
    assert!(!repo.has_staged_changes().await.unwrap());

    repo.undo_last_commit().await.unwrap();

    assert!(repo.has_staged_changes().await.unwrap());
}

#[test]
fn test_escaped_rules_match_paths_with_spaces_and_brackets() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let root = TempDir::new().unwrap();
    let work = root.path().join("work");
    fs::create_dir_all(&work).unwrap();
    git(&work, &["init", "--quiet"]);

    let attributes = work.join(".gitattributes");
    for path in ["data/my server/volume-data.tar.gz", "data/mc[1]/volume-data.tar.gz"] {
        lfs::ensure_tracking_rule(&attributes, &lfs::escape_pattern(Path::new(path))).unwrap();
    }

    for path in ["data/my server/volume-data.tar.gz", "data/mc[1]/volume-data.tar.gz"] {
        let out = git(&work, &["check-attr", "filter", "--", path]);
        assert_eq!(out.trim(), format!("{}: filter: lfs", path));
    }
    // the bracket rule must not act as a character class
    let out = git(&work, &["check-attr", "filter", "--", "data/mc1/volume-data.tar.gz"]);
    assert!(out.trim().ends_with("filter: unspecified"));
}
