//! In-memory [`Repository`] that replays scripted remote responses
//!
//! Pushes, rebases and merges pop their results from queues. When a queue
//! runs dry the operation succeeds, so tests only script the interesting
//! part of a conversation.

use anyhow::Result;
use keeper::services::git::{PushResult, Repository};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const FETCH_FIRST: &str = " ! [rejected]        HEAD -> main (fetch first)\n\
error: failed to push some refs to 'origin'\n\
hint: Updates were rejected because the remote contains work that you do\n\
hint: not have locally.";

pub const OVERSIZED: &str = "remote: error: File data/mc/volume-data.tar.gz is 80.00 MB; \
this exceeds GitHub's file size limit of 50.00 MB\n\
remote: error: GH001: Large files detected. You may want to try Git Large File Storage";

pub const AUTH_FAILED: &str =
    "fatal: Authentication failed for 'https://example.com/snapshots.git/'";

#[derive(Debug, Default)]
pub struct ScriptedRepository {
    calls: Mutex<Vec<String>>,
    pushes: Mutex<VecDeque<PushResult>>,
    rebases: Mutex<VecDeque<bool>>,
    merges: Mutex<VecDeque<bool>>,
    nothing_staged: bool,
}

impl ScriptedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A working tree whose index matches HEAD
    pub fn clean() -> Self {
        Self {
            nothing_staged: true,
            ..Self::default()
        }
    }

    pub fn reject_push(self, diagnostics: &str) -> Self {
        self.pushes
            .lock()
            .unwrap()
            .push_back(PushResult::Rejected(diagnostics.to_string()));
        self
    }

    pub fn accept_push(self) -> Self {
        self.pushes.lock().unwrap().push_back(PushResult::Accepted);
        self
    }

    pub fn rebase_conflicts(self) -> Self {
        self.rebases.lock().unwrap().push_back(false);
        self
    }

    pub fn merge_fails(self) -> Self {
        self.merges.lock().unwrap().push_back(false);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose name is `name`
    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(name))
            .count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl Repository for ScriptedRepository {
    async fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.record(format!("identity {} <{}>", name, email));
        Ok(())
    }

    async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.record(format!("stage {}", joined.join(",")));
        Ok(())
    }

    async fn renormalize(&self, path: &Path) -> Result<()> {
        self.record(format!("renormalize {}", path.display()));
        Ok(())
    }

    async fn enable_large_files(&self) -> Result<()> {
        self.record("enable_large_files");
        Ok(())
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        self.record("has_staged_changes");
        Ok(!self.nothing_staged)
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.record(format!("commit {}", message));
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<PushResult> {
        self.record(format!("push {}/{}", remote, branch));
        Ok(self
            .pushes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PushResult::Accepted))
    }

    async fn rebase(&self, remote: &str, branch: &str) -> Result<bool> {
        self.record(format!("rebase {}/{}", remote, branch));
        Ok(self.rebases.lock().unwrap().pop_front().unwrap_or(true))
    }

    async fn abort_rebase(&self) -> Result<()> {
        self.record("abort_rebase");
        Ok(())
    }

    async fn merge(&self, remote: &str, branch: &str) -> Result<bool> {
        self.record(format!("merge {}/{}", remote, branch));
        Ok(self.merges.lock().unwrap().pop_front().unwrap_or(true))
    }

    async fn undo_last_commit(&self) -> Result<()> {
        self.record("undo_last_commit");
        Ok(())
    }
}
