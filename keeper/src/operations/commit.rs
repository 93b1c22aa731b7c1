//! Commit-and-push with conflict recovery
//!
//! The push phase runs as an explicit state machine:
//!
//! ```text
//! Pushing(n) --accepted--------------------------> Pushed
//! Pushing(n) --remote moved, n < max-------------> Rebasing(n)
//! Pushing(n) --oversized file--------------------> Remediating
//! Pushing(n) --anything else / n == max----------> Failed
//! Rebasing(n) --ok-------------------------------> Pushing(n + 1)
//! Rebasing(n) --conflict (rebase aborted)--------> Merging(n)
//! Merging(n) --ok--------------------------------> Pushing(n + 1)
//! Merging(n) --failed----------------------------> Failed
//! Remediating --one final push-------------------> Pushed | Failed
//! ```
//!
//! Remediation runs at most once per call.

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::CommitterConfig;
use crate::constants;
use crate::services::git::{PushRejection, PushResult, Repository};
use crate::services::lfs;
use crate::types::CommitOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushState {
    Pushing { attempt: u32 },
    Rebasing { attempt: u32 },
    Merging { attempt: u32 },
    Remediating { attempt: u32, reason: String },
    Pushed { attempts: u32, remediated: bool },
    Failed { reason: String },
}

pub struct Committer<R: Repository> {
    repo: R,
    config: CommitterConfig,
}

pub fn default_commit_message() -> String {
    format!(
        "Update volume snapshots ({})",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Suggested operator action for a failed push
pub fn failure_hint(reason: &str) -> Option<&'static str> {
    match PushRejection::classify(reason) {
        PushRejection::Oversized => Some(
            "install git-lfs on this host and run \
             `git lfs migrate import --include='**/volume-data.tar.gz'` before retrying",
        ),
        PushRejection::RemoteMoved => {
            Some("another instance keeps pushing to the same branch; retry once it settles")
        }
        PushRejection::Other => {
            let text = reason.to_lowercase();
            if text.contains("authentication") || text.contains("permission denied") {
                Some("check the credentials this host uses for the remote")
            } else {
                None
            }
        }
    }
}

impl<R: Repository> Committer<R> {
    pub fn new(repo: R, config: CommitterConfig) -> Self {
        Self { repo, config }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &CommitterConfig {
        &self.config
    }

    fn attributes_path(&self) -> PathBuf {
        self.config.repo_root.join(constants::lfs::ATTRIBUTES_FILE)
    }

    fn data_root(&self) -> PathBuf {
        self.config.repo_root.join(&self.config.data_path)
    }

    /// Repository-relative paths that belong in a snapshot commit
    fn stage_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if self.data_root().exists() {
            paths.push(self.config.data_path.clone());
        }
        if self.attributes_path().exists() {
            paths.push(PathBuf::from(constants::lfs::ATTRIBUTES_FILE));
        }
        paths
    }

    pub async fn commit_and_push(&self, message: Option<&str>) -> Result<CommitOutcome> {
        info!(
            "Committing snapshots under {} to {}/{}",
            self.data_root().display(),
            self.config.remote,
            self.config.branch
        );

        // Step 1: Commit as the configured bot identity
        self.repo
            .configure_identity(&self.config.author_name, &self.config.author_email)
            .await?;

        // Step 2-3: Large archives get a tracking rule and are re-staged through LFS
        self.register_large_archives().await?;

        // Step 4: Stage everything under the data path
        self.repo.stage(&self.stage_paths()).await?;

        // Step 5: Nothing new since the last commit
        if !self.repo.has_staged_changes().await? {
            info!("No snapshot changes to commit");
            return Ok(CommitOutcome::NoChanges);
        }

        // Step 6: Local commit
        let message = message
            .map(str::to_string)
            .unwrap_or_else(default_commit_message);
        self.repo.commit(&message).await?;
        info!("✓ Committed: {}", message);

        // Step 7-8: Push, recovering from races and oversized files
        let outcome = self.push_with_recovery(&message).await?;
        match &outcome {
            CommitOutcome::Pushed { attempts, remediated } => info!(
                "✓ Pushed to {}/{} after {} attempt(s){}",
                self.config.remote,
                self.config.branch,
                attempts,
                if *remediated { " with large-file remediation" } else { "" }
            ),
            CommitOutcome::Failed { reason } => warn!("Push failed: {}", reason),
            CommitOutcome::NoChanges => {}
        }
        Ok(outcome)
    }

    async fn register_large_archives(&self) -> Result<()> {
        let threshold = self.config.large_file_threshold;
        let large = lfs::scan_large_archives(&self.data_root(), threshold)?;
        if large.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.repo.enable_large_files().await {
            warn!("Could not enable LFS in {}: {}", self.config.repo_root.display(), e);
        }

        for archive in large {
            let relative = match lfs::relative_to(&archive.path, &self.config.repo_root) {
                Some(rel) => rel,
                None => {
                    warn!(
                        "{} is outside {}, not tracking it",
                        archive.path.display(),
                        self.config.repo_root.display()
                    );
                    continue;
                }
            };
            let pattern = lfs::escape_pattern(&relative);
            info!(
                "{} is {:.1} MB, tracking via LFS",
                pattern,
                archive.size_bytes as f64 / 1024.0 / 1024.0
            );

            lfs::ensure_tracking_rule(&self.attributes_path(), &pattern)?;
            if let Err(e) = self.repo.renormalize(&relative).await {
                warn!("LFS registration of {} failed: {}", pattern, e);
            }
        }
        Ok(())
    }

    /// Drive the push state machine to a terminal state
    pub async fn push_with_recovery(&self, message: &str) -> Result<CommitOutcome> {
        let mut state = PushState::Pushing { attempt: 1 };
        loop {
            state = match state {
                PushState::Pushed { attempts, remediated } => {
                    return Ok(CommitOutcome::Pushed { attempts, remediated })
                }
                PushState::Failed { reason } => return Ok(CommitOutcome::Failed { reason }),
                pending => {
                    debug!("Push state: {:?}", pending);
                    self.advance(pending, message).await?
                }
            };
        }
    }

    async fn advance(&self, state: PushState, message: &str) -> Result<PushState> {
        let remote = self.config.remote.as_str();
        let branch = self.config.branch.as_str();

        let next = match state {
            PushState::Pushing { attempt } => match self.repo.push(remote, branch).await? {
                PushResult::Accepted => PushState::Pushed {
                    attempts: attempt,
                    remediated: false,
                },
                PushResult::Rejected(reason) => {
                    warn!("Push attempt {} rejected: {}", attempt, reason);
                    match PushRejection::classify(&reason) {
                        PushRejection::Oversized => PushState::Remediating { attempt, reason },
                        PushRejection::RemoteMoved if attempt < self.config.max_push_attempts => {
                            PushState::Rebasing { attempt }
                        }
                        PushRejection::RemoteMoved => PushState::Failed {
                            reason: format!(
                                "remote kept moving after {} push attempts: {}",
                                attempt, reason
                            ),
                        },
                        PushRejection::Other => PushState::Failed { reason },
                    }
                }
            },

            PushState::Rebasing { attempt } => {
                if self.repo.rebase(remote, branch).await? {
                    info!("✓ Rebased onto {}/{}", remote, branch);
                    self.pause_before_retry().await;
                    PushState::Pushing { attempt: attempt + 1 }
                } else {
                    self.repo.abort_rebase().await?;
                    info!("Rebase conflicted, trying a merge instead");
                    PushState::Merging { attempt }
                }
            }

            PushState::Merging { attempt } => {
                if self.repo.merge(remote, branch).await? {
                    info!("✓ Merged {}/{}", remote, branch);
                    self.pause_before_retry().await;
                    PushState::Pushing { attempt: attempt + 1 }
                } else {
                    PushState::Failed {
                        reason: format!("could not rebase or merge onto {}/{}", remote, branch),
                    }
                }
            }

            PushState::Remediating { attempt, reason } => {
                warn!("Remote refused an oversized file, migrating snapshot archives to LFS");
                match self.remediate(message).await {
                    Ok(PushResult::Accepted) => PushState::Pushed {
                        attempts: attempt + 1,
                        remediated: true,
                    },
                    Ok(PushResult::Rejected(final_reason)) => PushState::Failed {
                        reason: final_reason,
                    },
                    Err(e) => PushState::Failed {
                        reason: format!(
                            "large-file remediation failed: {} (original rejection: {})",
                            e, reason
                        ),
                    },
                }
            }

            terminal @ (PushState::Pushed { .. } | PushState::Failed { .. }) => terminal,
        };
        Ok(next)
    }

    /// Undo the commit, track every archive via LFS, re-commit and push once
    async fn remediate(&self, message: &str) -> Result<PushResult> {
        self.repo.undo_last_commit().await?;
        lfs::force_archive_rule(&self.attributes_path())?;

        if let Err(e) = self.repo.enable_large_files().await {
            warn!("Could not enable LFS: {}", e);
        }
        self.repo.stage(&self.stage_paths()).await?;
        if let Err(e) = self.repo.renormalize(&self.config.data_path).await {
            warn!("Could not renormalize {}: {}", self.config.data_path.display(), e);
        }

        self.repo.commit(message).await?;
        info!("✓ Re-committed with LFS tracking for all snapshot archives");

        self.repo
            .push(&self.config.remote, &self.config.branch)
            .await
    }

    async fn pause_before_retry(&self) {
        if !self.config.retry_delay.is_zero() {
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }
}
