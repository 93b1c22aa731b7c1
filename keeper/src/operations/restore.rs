use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::constants::snapshot;
use crate::errors::{require_path, KeeperError};
use crate::operations::{blocking, path_exists};
use crate::services::{archive, mirror, ownership};
use crate::types::{RestoreOutcome, RestoreRequest, SnapshotEncoding};

pub async fn execute_restore_sequence(request: &RestoreRequest) -> Result<RestoreOutcome> {
    require_path("volume_path", &request.volume_path)?;
    require_path("snapshot_path", &request.snapshot_path)?;

    let volume = request.volume_path.clone();
    let snapshot_dir = request.snapshot_path.clone();
    info!(
        "Starting volume restore: {} from snapshot {}",
        volume.display(),
        snapshot_dir.display()
    );

    // Step 1: Make sure the volume directory exists
    fs::create_dir_all(&volume)
        .await
        .map_err(|e| KeeperError::from_io(&volume, &e))?;
    info!("✓ Volume directory ready: {}", volume.display());

    // Step 2: A missing or empty snapshot is a first run, not a failure
    let outcome = if !snapshot_has_entries(&snapshot_dir).await? {
        info!(
            "No snapshot data at {} - starting with an empty volume",
            snapshot_dir.display()
        );
        RestoreOutcome::Empty
    } else {
        // Step 3: Prefer the compressed form, fall back to mirroring the snapshot tree
        let archive_path = snapshot_dir.join(snapshot::ARCHIVE_NAME);
        let encoding = if path_exists(&archive_path).await? {
            restore_from_archive(archive_path, snapshot_dir.clone(), volume.clone()).await?
        } else {
            info!("No compressed snapshot found, restoring legacy mirrored tree");
            mirror_into(snapshot_dir.clone(), volume.clone()).await?;
            SnapshotEncoding::Mirrored
        };
        info!("✓ Volume restored from {}", encoding);
        RestoreOutcome::Restored { encoding }
    };

    // Step 4: Hand the volume to the workload's user
    if let Some(owner) = &request.owner {
        match ownership::apply_owner(&volume, owner).await {
            Ok(()) => info!("✓ Ownership set to {}", owner),
            Err(e) => warn!("Could not set ownership of {} to {}: {}", volume.display(), owner, e),
        }
    }

    info!("Volume restore completed for {}", volume.display());
    Ok(outcome)
}

async fn restore_from_archive(
    archive_path: PathBuf,
    snapshot_dir: PathBuf,
    volume: PathBuf,
) -> Result<SnapshotEncoding> {
    let target = volume.clone();
    match blocking(move || archive::extract_archive(&archive_path, &target)).await {
        Ok(()) => Ok(SnapshotEncoding::Compressed),
        Err(e) => {
            warn!("Archive extraction failed ({}), falling back to mirror copy", e);
            mirror_into(snapshot_dir, volume).await?;
            Ok(SnapshotEncoding::Mirrored)
        }
    }
}

async fn mirror_into(source: PathBuf, dest: PathBuf) -> Result<()> {
    blocking(move || mirror::mirror_directory(&source, &dest).map(|_| ())).await
}

async fn snapshot_has_entries(snapshot_dir: &Path) -> Result<bool> {
    match fs::metadata(snapshot_dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(KeeperError::from_io(snapshot_dir, &e).into()),
    }

    let mut entries = fs::read_dir(snapshot_dir)
        .await
        .map_err(|e| KeeperError::from_io(snapshot_dir, &e))?;
    Ok(entries
        .next_entry()
        .await
        .map_err(|e| KeeperError::from_io(snapshot_dir, &e))?
        .is_some())
}
