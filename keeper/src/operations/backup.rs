use anyhow::Result;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{info, warn};

use crate::constants::snapshot;
use crate::errors::{require_path, KeeperError};
use crate::operations::{blocking, path_exists, stats};
use crate::services::workload::WorkloadControl;
use crate::services::{archive, mirror};
use crate::types::{BackupOutcome, BackupRequest, SnapshotEncoding};

pub async fn execute_backup_sequence<W: WorkloadControl>(
    request: &BackupRequest,
    workload: &W,
) -> Result<BackupOutcome> {
    require_path("volume_path", &request.volume_path)?;
    require_path("snapshot_path", &request.snapshot_path)?;

    let volume = request.volume_path.clone();
    let snapshot_dir = request.snapshot_path.clone();
    info!(
        "Starting volume backup: {} into snapshot {}",
        volume.display(),
        snapshot_dir.display()
    );

    // Step 1: Nothing to back up without a volume
    if !path_exists(&volume).await? {
        info!("Volume {} does not exist - skipping backup", volume.display());
        return Ok(BackupOutcome::Skipped);
    }

    // Step 2: Quiesce the workload (best effort)
    if let Some(container) = &request.container {
        match workload.stop(container).await {
            Ok(()) => info!("✓ Workload {} stopped", container),
            Err(e) => warn!("Could not stop workload {} ({}), backing up anyway", container, e),
        }
        tokio::time::sleep(request.settle_delay).await;
    }

    // Step 3: Replace the snapshot
    let written = write_snapshot(request).await;

    // Step 4: Bring the workload back whatever happened above
    if let Some(container) = &request.container {
        match workload.start(container).await {
            Ok(()) => info!("✓ Workload {} restarted", container),
            Err(e) => warn!("Could not restart workload {}: {}", container, e),
        }
    }

    let encoding = written?;
    let usage_dir = snapshot_dir.clone();
    let usage = blocking(move || stats::directory_usage(&usage_dir)).await?;

    info!(
        "Volume backup completed: {} ({:.1} MB) at {}",
        encoding,
        usage.size_bytes as f64 / 1024.0 / 1024.0,
        snapshot_dir.display()
    );

    Ok(BackupOutcome::Backed {
        encoding,
        size_bytes: usage.size_bytes,
    })
}

async fn write_snapshot(request: &BackupRequest) -> Result<SnapshotEncoding> {
    let volume = request.volume_path.clone();
    let snapshot_dir = request.snapshot_path.clone();

    // Prepare the destination: backups are full replacements, never merges
    fs::create_dir_all(&snapshot_dir)
        .await
        .map_err(|e| KeeperError::from_io(&snapshot_dir, &e))?;
    let purge_dir = snapshot_dir.clone();
    blocking(move || mirror::purge_directory(&purge_dir)).await?;
    info!("✓ Previous snapshot contents cleared");

    if request.compress {
        let source = volume.clone();
        let level = request.compression_level;
        match blocking(move || archive::create_archive(&source, level)).await {
            Ok((temp, _summary)) => {
                let dest = snapshot_dir.join(snapshot::ARCHIVE_NAME);
                if install_verified(temp, dest).await {
                    info!("✓ Compressed snapshot written");
                    return Ok(SnapshotEncoding::Compressed);
                }
            }
            Err(e) => warn!("Compression failed: {}", e),
        }
        warn!("Falling back to uncompressed mirror copy");
    } else {
        info!("Compression disabled, writing mirrored tree");
    }

    blocking(move || mirror::mirror_directory(&volume, &snapshot_dir)).await?;
    info!("✓ Mirrored snapshot written");
    Ok(SnapshotEncoding::Mirrored)
}

/// Move the temporary archive into place and verify it there.
///
/// On any failure the destination is removed again and `false` is returned.
pub(crate) async fn install_verified(temp: NamedTempFile, dest: PathBuf) -> bool {
    let result = blocking(move || {
        let verified =
            archive::install_archive(temp, &dest).and_then(|_| archive::verify_archive(&dest));
        match verified {
            Ok(entries) => {
                info!("Archive verified: {} entries", entries);
                Ok(true)
            }
            Err(e) => {
                warn!("Archive at {} is unusable: {}", dest.display(), e);
                if let Err(rm) = std::fs::remove_file(&dest) {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove bad archive {}: {}", dest.display(), rm);
                    }
                }
                Ok(false)
            }
        }
    })
    .await;

    result.unwrap_or(false)
}
