use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::constants::snapshot;
use crate::errors::{require_path, KeeperError};
use crate::operations::{blocking, path_exists};
use crate::types::StatsReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryUsage {
    pub size_bytes: u64,
    pub file_count: u64,
}

/// Total size and regular-file count below `dir` (symlinks not followed)
pub fn directory_usage(dir: &Path) -> Result<DirectoryUsage> {
    let mut usage = DirectoryUsage::default();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() {
            if let Ok(meta) = entry.metadata() {
                usage.size_bytes += meta.len();
                usage.file_count += 1;
            }
        }
    }
    Ok(usage)
}

pub fn compression_ratio(compressed: u64, uncompressed: u64) -> Option<f64> {
    if uncompressed == 0 {
        return None;
    }
    Some(compressed as f64 / uncompressed as f64 * 100.0)
}

/// Read-only report on a volume and, optionally, its compressed snapshot
pub async fn collect_stats(
    volume_path: &Path,
    snapshot_path: Option<&Path>,
) -> Result<StatsReport> {
    require_path("volume_path", volume_path)?;

    if !path_exists(volume_path).await? {
        return Err(KeeperError::Io {
            path: volume_path.display().to_string(),
            reason: "volume does not exist".to_string(),
        }
        .into());
    }

    let volume: PathBuf = volume_path.to_path_buf();
    let usage = blocking(move || directory_usage(&volume)).await?;

    let compressed_size_bytes = match snapshot_path {
        Some(dir) => tokio::fs::metadata(dir.join(snapshot::ARCHIVE_NAME))
            .await
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len()),
        None => None,
    };
    let ratio = compressed_size_bytes.and_then(|c| compression_ratio(c, usage.size_bytes));

    info!(
        "Volume {}: {} files, {:.1} MB",
        volume_path.display(),
        usage.file_count,
        usage.size_bytes as f64 / 1024.0 / 1024.0
    );
    if let (Some(compressed), Some(ratio)) = (compressed_size_bytes, ratio) {
        info!(
            "Compressed snapshot: {:.1} MB ({:.1}% of volume)",
            compressed as f64 / 1024.0 / 1024.0,
            ratio
        );
    }

    Ok(StatsReport {
        size_bytes: usage.size_bytes,
        file_count: usage.file_count,
        compressed_size_bytes,
        ratio,
    })
}
