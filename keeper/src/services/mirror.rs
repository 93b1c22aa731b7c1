//! Delete-then-copy directory mirroring, the uncompressed snapshot form

use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::errors::KeeperError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub copied: u64,
    pub failed: u64,
}

/// Remove every entry inside `dir`, keeping `dir` itself
pub fn purge_directory(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(KeeperError::from_io(dir, &e).into()),
    };

    for entry in entries {
        let entry = entry.map_err(|e| KeeperError::from_io(dir, &e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| KeeperError::from_io(&path, &e))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| KeeperError::from_io(&path, &e))?;
    }
    Ok(())
}

/// Make `dest` an exact copy of `source`.
///
/// `dest` is emptied first so entries absent from `source` disappear. Files
/// that fail to copy are logged and counted.
pub fn mirror_directory(source: &Path, dest: &Path) -> Result<MirrorSummary> {
    info!("Mirroring {} to {}", source.display(), dest.display());

    fs::create_dir_all(dest).map_err(|e| KeeperError::from_io(dest, &e))?;
    purge_directory(dest)?;

    let mut summary = MirrorSummary::default();
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping path during mirror: {}", err);
                summary.failed += 1;
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let rel = entry.path().strip_prefix(source)?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        let result = if file_type.is_dir() {
            fs::create_dir_all(&target)
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map(|_| ())
        } else {
            continue;
        };

        match result {
            Ok(()) => summary.copied += 1,
            Err(e) => {
                warn!("Failed to copy {}: {}", entry.path().display(), e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Mirror complete: {} entries copied, {} failed",
        summary.copied, summary.failed
    );
    Ok(summary)
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(source, target).map(|_| ())
}
