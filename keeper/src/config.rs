//! Pipeline configuration
//!
//! Everything has a default, so a config file is optional. Values are layered
//! as: defaults, then the TOML file, then `KEEPER_*` environment variables.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants;
use crate::errors::{ConfigError, KeeperError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub repository: RepositoryConfig,
    pub push: PushConfig,
    pub workload: WorkloadConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub root: PathBuf,
    /// Snapshot root, relative to `root`
    pub data_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_path: PathBuf::from(constants::repository::DEFAULT_DATA_PATH),
            remote: constants::repository::DEFAULT_REMOTE.to_string(),
            branch: constants::repository::DEFAULT_BRANCH.to_string(),
            author_name: constants::repository::DEFAULT_AUTHOR_NAME.to_string(),
            author_email: constants::repository::DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub max_attempts: u32,
    pub retry_delay_seconds: u64,
    pub large_file_threshold_bytes: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::push::MAX_ATTEMPTS,
            retry_delay_seconds: constants::push::RETRY_DELAY.as_secs(),
            large_file_threshold_bytes: constants::lfs::LARGE_FILE_THRESHOLD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Container CLI used for the default stop/start
    pub runtime: String,
    pub settle_delay_seconds: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            runtime: constants::workload::DEFAULT_RUNTIME.to_string(),
            settle_delay_seconds: constants::workload::SETTLE_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub compression_level: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compression_level: constants::snapshot::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Everything the committer needs, passed in explicitly
#[derive(Debug, Clone)]
pub struct CommitterConfig {
    pub repo_root: PathBuf,
    pub data_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub author_name: String,
    pub author_email: String,
    pub max_push_attempts: u32,
    pub retry_delay: Duration,
    pub large_file_threshold: u64,
}

impl CommitterConfig {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        KeeperConfig {
            repository: RepositoryConfig {
                root: repo_root.into(),
                ..RepositoryConfig::default()
            },
            ..KeeperConfig::default()
        }
        .committer()
    }
}

impl KeeperConfig {
    /// Load from `path` if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeeperError::from(ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        let config = Self::from_toml(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            KeeperError::from(ConfigError::ParseError {
                reason: e.to_string(),
            })
            .into()
        })
    }

    /// Override repository settings from `KEEPER_*` variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get("KEEPER_REPO_ROOT") {
            self.repository.root = PathBuf::from(root);
        }
        if let Some(data_path) = get("KEEPER_DATA_PATH") {
            self.repository.data_path = PathBuf::from(data_path);
        }
        if let Some(remote) = get("KEEPER_REMOTE") {
            self.repository.remote = remote;
        }
        if let Some(branch) = get("KEEPER_BRANCH") {
            self.repository.branch = branch;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| -> anyhow::Error {
            KeeperError::from(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            })
            .into()
        };

        if self.repository.branch.trim().is_empty() {
            return Err(invalid("repository.branch", "must not be empty"));
        }
        if self.repository.remote.trim().is_empty() {
            return Err(invalid("repository.remote", "must not be empty"));
        }
        if self.repository.data_path.is_absolute() {
            return Err(invalid("repository.data_path", "must be relative to repository.root"));
        }
        if self.push.max_attempts == 0 {
            return Err(invalid("push.max_attempts", "must be at least 1"));
        }
        if self.archive.compression_level > 9 {
            return Err(invalid("archive.compression_level", "must be between 0 and 9"));
        }
        Ok(())
    }

    pub fn committer(&self) -> CommitterConfig {
        CommitterConfig {
            repo_root: self.repository.root.clone(),
            data_path: self.repository.data_path.clone(),
            remote: self.repository.remote.clone(),
            branch: self.repository.branch.clone(),
            author_name: self.repository.author_name.clone(),
            author_email: self.repository.author_email.clone(),
            max_push_attempts: self.push.max_attempts,
            retry_delay: Duration::from_secs(self.push.retry_delay_seconds),
            large_file_threshold: self.push.large_file_threshold_bytes,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.workload.settle_delay_seconds)
    }
}
