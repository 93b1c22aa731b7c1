//! Version-control seam used by the committer
//!
//! [`Repository`] is the narrow set of operations the push state machine
//! needs; [`GitRepository`] implements it by running `git` in a working tree.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::KeeperError;
use crate::services::commands::{self, CommandOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Accepted,
    /// The remote refused the push; carries its diagnostic text
    Rejected(String),
}

/// Why a push was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    /// The remote branch moved ahead of the local one
    RemoteMoved,
    /// The host refused a file over its size cap
    Oversized,
    Other,
}

impl PushRejection {
    pub fn classify(diagnostics: &str) -> Self {
        let text = diagnostics.to_lowercase();

        const OVERSIZED: [&str; 5] = [
            "gh001",
            "large files detected",
            "file size limit",
            "exceeds",
            "too large",
        ];
        const MOVED: [&str; 4] = [
            "non-fast-forward",
            "fetch first",
            "remote contains work that you do",
            "tip of your current branch is behind",
        ];

        if OVERSIZED.iter().any(|m| text.contains(m)) {
            PushRejection::Oversized
        } else if MOVED.iter().any(|m| text.contains(m)) {
            PushRejection::RemoteMoved
        } else {
            PushRejection::Other
        }
    }
}

pub trait Repository {
    fn configure_identity(
        &self,
        name: &str,
        email: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Stage additions, modifications and deletions under `paths`
    fn stage(&self, paths: &[PathBuf]) -> impl Future<Output = Result<()>> + Send;

    /// Re-apply attribute filters (LFS) to already tracked content
    fn renormalize(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Install the LFS filters for this working tree
    fn enable_large_files(&self) -> impl Future<Output = Result<()>> + Send;

    fn has_staged_changes(&self) -> impl Future<Output = Result<bool>> + Send;

    fn commit(&self, message: &str) -> impl Future<Output = Result<()>> + Send;

    fn push(&self, remote: &str, branch: &str) -> impl Future<Output = Result<PushResult>> + Send;

    /// Rebase onto the remote branch; `false` means it stopped on a conflict
    fn rebase(&self, remote: &str, branch: &str) -> impl Future<Output = Result<bool>> + Send;

    fn abort_rebase(&self) -> impl Future<Output = Result<()>> + Send;

    /// Merge the remote branch; `false` means the merge could not complete
    fn merge(&self, remote: &str, branch: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Drop the last local commit, keeping its changes staged
    fn undo_last_commit(&self) -> impl Future<Output = Result<()>> + Send;
}

/// A git working tree driven through the `git` binary
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn git<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        commands::run("git", args, Some(&self.root)).await
    }

    async fn git_checked(&self, args: &[&str]) -> Result<String> {
        commands::run_checked("git", args, Some(&self.root)).await
    }
}

impl Repository for GitRepository {
    async fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.git_checked(&["config", "user.name", name]).await?;
        self.git_checked(&["config", "user.email", email]).await?;
        debug!("Commit identity set to {} <{}>", name, email);
        Ok(())
    }

    async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["add".into(), "-A".into(), "--".into()];
        args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));

        let output = self.git(&args).await?;
        if !output.success {
            return Err(KeeperError::Command {
                program: "git".to_string(),
                reason: format!("git add failed: {}", output.diagnostics()),
            }
            .into());
        }
        Ok(())
    }

    async fn renormalize(&self, path: &Path) -> Result<()> {
        let output = self
            .git([
                OsString::from("add"),
                OsString::from("--renormalize"),
                OsString::from("--"),
                path.as_os_str().to_os_string(),
            ])
            .await?;
        if !output.success {
            return Err(anyhow!("git add --renormalize failed: {}", output.diagnostics()));
        }
        Ok(())
    }

    async fn enable_large_files(&self) -> Result<()> {
        self.git_checked(&["lfs", "install", "--local"]).await?;
        Ok(())
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        let output = self.git(["diff", "--cached", "--quiet"]).await?;
        match output.exit_code {
            0 => Ok(false),
            1 => Ok(true),
            code => Err(KeeperError::Command {
                program: "git".to_string(),
                reason: format!("git diff --cached exited {}: {}", code, output.diagnostics()),
            }
            .into()),
        }
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.git_checked(&["commit", "--quiet", "-m", message]).await?;
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<PushResult> {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let output = self.git(["push", remote, refspec.as_str()]).await?;
        if output.success {
            Ok(PushResult::Accepted)
        } else {
            Ok(PushResult::Rejected(output.diagnostics().to_string()))
        }
    }

    async fn rebase(&self, remote: &str, branch: &str) -> Result<bool> {
        let output = self.git(["pull", "--rebase", remote, branch]).await?;
        if !output.success {
            warn!("Rebase onto {}/{} failed: {}", remote, branch, output.diagnostics());
        }
        Ok(output.success)
    }

    async fn abort_rebase(&self) -> Result<()> {
        let output = self.git(["rebase", "--abort"]).await?;
        if !output.success {
            debug!("git rebase --abort: {}", output.diagnostics());
        }
        Ok(())
    }

    async fn merge(&self, remote: &str, branch: &str) -> Result<bool> {
        let output = self
            .git(["pull", "--no-rebase", "--no-edit", remote, branch])
            .await?;
        if output.success {
            return Ok(true);
        }

        warn!("Merge of {}/{} failed: {}", remote, branch, output.diagnostics());
        let abort = self.git(["merge", "--abort"]).await?;
        if !abort.success {
            debug!("git merge --abort: {}", abort.diagnostics());
        }
        Ok(false)
    }

    async fn undo_last_commit(&self) -> Result<()> {
        let parent = self.git(["rev-parse", "--verify", "--quiet", "HEAD~1"]).await?;
        if parent.success {
            self.git_checked(&["reset", "--soft", "HEAD~1"]).await?;
        } else {
            // root commit: unborn branch, index untouched
            self.git_checked(&["update-ref", "-d", "HEAD"]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(
        " ! [rejected]        HEAD -> main (fetch first)",
        PushRejection::RemoteMoved ;
        "fetch first"
    )]
    #[test_case(
        " ! [rejected]        HEAD -> main (non-fast-forward)",
        PushRejection::RemoteMoved ;
        "non fast forward"
    )]
    #[test_case(
        "remote: error: GH001: Large files detected. You may want to try Git Large File Storage",
        PushRejection::Oversized ;
        "github large file"
    )]
    #[test_case(
        "remote: error: File data/mc/volume-data.tar.gz is 80.00 MB; \
         this exceeds GitHub's file size limit of 50.00 MB",
        PushRejection::Oversized ;
        "size limit"
    )]
    #[test_case(
        "fatal: Authentication failed for 'https://example.com/repo.git/'",
        PushRejection::Other ;
        "auth failure"
    )]
    fn rejections_are_classified(diagnostics: &str, expected: PushRejection) {
        assert_eq!(PushRejection::classify(diagnostics), expected);
    }
}
