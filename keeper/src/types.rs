use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::errors::KeeperError;

// === REQUEST STRUCTURES ===

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub volume_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub owner: Option<Owner>,
}

#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub volume_path: PathBuf,
    pub snapshot_path: PathBuf,
    /// Workload to quiesce around the backup, if any
    pub container: Option<String>,
    /// `false` skips the archive and writes the mirrored tree directly
    pub compress: bool,
    pub compression_level: u32,
    pub settle_delay: Duration,
}

impl BackupRequest {
    pub fn new(volume_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            volume_path: volume_path.into(),
            snapshot_path: snapshot_path.into(),
            container: None,
            compress: true,
            compression_level: constants::snapshot::DEFAULT_COMPRESSION_LEVEL,
            settle_delay: constants::workload::SETTLE_DELAY,
        }
    }
}

/// Ownership applied to a restored volume, parsed from `UID:GID`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl FromStr for Owner {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uid, gid) = s.trim().split_once(':').ok_or_else(|| {
            KeeperError::invalid_argument("owner", format!("expected UID:GID, got '{}'", s))
        })?;

        let parse = |part: &str, name: &str| {
            part.parse::<u32>().map_err(|_| {
                let reason = format!("{} '{}' is not numeric", name, part);
                KeeperError::invalid_argument("owner", reason)
            })
        };

        Ok(Owner {
            uid: parse(uid, "uid")?,
            gid: parse(gid, "gid")?,
        })
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

// === OUTCOME STRUCTURES ===

/// Physical form a snapshot is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotEncoding {
    /// Single `volume-data.tar.gz` archive
    Compressed,
    /// Legacy mirrored directory tree
    Mirrored,
}

impl fmt::Display for SnapshotEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotEncoding::Compressed => write!(f, "compressed archive"),
            SnapshotEncoding::Mirrored => write!(f, "mirrored tree"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored { encoding: SnapshotEncoding },
    /// No prior snapshot; the volume was left present but empty
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Backed {
        encoding: SnapshotEncoding,
        size_bytes: u64,
    },
    /// The volume did not exist; nothing was touched
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Pushed { attempts: u32, remediated: bool },
    NoChanges,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub size_bytes: u64,
    pub file_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size_bytes: Option<u64>,
    /// compressed / uncompressed × 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}
