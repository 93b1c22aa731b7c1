//! gzip-compressed tar codec for volume snapshots
//!
//! Archives are rooted at `.` and written to a process-local temporary file
//! first. Only [`install_archive`] ever puts a file at the final snapshot
//! name, and it does so with a rename.

use anyhow::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::KeeperError;

/// Counters describing how an archive was built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written to the archive
    pub entries: u64,
    /// Paths left out because they could not be read at all
    pub skipped: u64,
    /// Files whose content changed or failed while being read
    pub damaged: u64,
}

/// Reader that turns a mid-stream read error into end-of-file
struct TolerantReader<R> {
    inner: R,
    path: PathBuf,
    bytes_read: u64,
    failed: bool,
}

impl<R: Read> TolerantReader<R> {
    fn new(inner: R, path: &Path) -> Self {
        Self {
            inner,
            path: path.to_path_buf(),
            bytes_read: 0,
            failed: false,
        }
    }
}

impl<R: Read> Read for TolerantReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.failed {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(n) => {
                self.bytes_read += n as u64;
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                warn!(
                    "Read error in {} after {} bytes: {}",
                    self.path.display(),
                    self.bytes_read,
                    e
                );
                self.failed = true;
                Ok(0)
            }
        }
    }
}

/// Build a tar.gz of everything below `source` into a temporary file.
///
/// Per-file problems are absorbed: unreadable paths are skipped, and a file
/// that shrinks, grows or errors mid-read is stored with exactly the size its
/// header announced.
pub fn create_archive(source: &Path, level: u32) -> Result<(NamedTempFile, ArchiveSummary)> {
    info!("Compressing {} (gzip level {})", source.display(), level);

    let temp = NamedTempFile::new().map_err(|e| KeeperError::from_io(&std::env::temp_dir(), &e))?;
    let mut summary = ArchiveSummary::default();

    {
        let encoder = GzEncoder::new(
            BufWriter::new(temp.as_file()),
            Compression::new(level.min(9)),
        );
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);

        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping path during archive walk: {}", err);
                    summary.skipped += 1;
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let rel = path.strip_prefix(source)?;
            let name = Path::new(".").join(rel);

            let metadata = match fs::symlink_metadata(path) {
                Ok(meta) => meta,
                Err(err) => {
                    warn!("Skipping {}: {}", path.display(), err);
                    summary.skipped += 1;
                    continue;
                }
            };

            let file_type = metadata.file_type();
            let mut header = Header::new_gnu();
            header.set_metadata(&metadata);

            if file_type.is_dir() {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, &name, io::empty())?;
            } else if file_type.is_file() {
                let file = match File::open(path) {
                    Ok(file) => file,
                    Err(err) => {
                        warn!("Skipping unreadable file {}: {}", path.display(), err);
                        summary.skipped += 1;
                        continue;
                    }
                };
                let len = metadata.len();
                let mut reader = TolerantReader::new(BufReader::new(file), path);
                let data = (&mut reader).take(len).chain(io::repeat(0)).take(len);
                builder.append_data(&mut header, &name, data)?;

                if reader.failed || reader.bytes_read < len {
                    warn!(
                        "File {} changed while archiving ({} of {} bytes captured)",
                        path.display(),
                        reader.bytes_read,
                        len
                    );
                    summary.damaged += 1;
                }
            } else if file_type.is_symlink() {
                let target = match fs::read_link(path) {
                    Ok(target) => target,
                    Err(err) => {
                        warn!("Skipping unreadable symlink {}: {}", path.display(), err);
                        summary.skipped += 1;
                        continue;
                    }
                };
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                builder.append_link(&mut header, &name, &target)?;
            } else {
                debug!("Skipping special file {}", path.display());
                summary.skipped += 1;
                continue;
            }

            summary.entries += 1;
        }

        let encoder = builder.into_inner()?;
        encoder.finish()?.flush()?;
    }

    info!(
        "Archive built: {} entries, {} skipped, {} changed during read",
        summary.entries, summary.skipped, summary.damaged
    );
    Ok((temp, summary))
}

/// Move a finished temporary archive to `dest`
pub fn install_archive(temp: NamedTempFile, dest: &Path) -> Result<()> {
    match temp.persist(dest) {
        Ok(_) => Ok(()),
        Err(err) => {
            // rename(2) cannot cross filesystems; stage a sibling copy and rename that
            debug!("Direct rename into {} failed ({}), copying", dest.display(), err.error);
            let temp = err.file;
            let partial = dest.with_extension("gz.partial");
            let copied = fs::copy(temp.path(), &partial).and_then(|_| fs::rename(&partial, dest));
            if let Err(e) = copied {
                let _ = fs::remove_file(&partial);
                return Err(KeeperError::from_io(dest, &e).into());
            }
            Ok(())
        }
    }
}

/// Decompress and read every entry of an archive to its end.
///
/// Returns the number of entries. Any framing, CRC or truncation problem is
/// reported as `KeeperError::Integrity`.
pub fn verify_archive(path: &Path) -> Result<u64> {
    fn walk(path: &Path) -> io::Result<u64> {
        let mut archive = Archive::new(GzDecoder::new(BufReader::new(File::open(path)?)));
        let mut count = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            entry.path()?;
            io::copy(&mut entry, &mut io::sink())?;
            count += 1;
        }
        // drain the gzip trailer so the CRC is checked
        let mut decoder = archive.into_inner();
        io::copy(&mut decoder, &mut io::sink())?;
        Ok(count)
    }

    walk(path).map_err(|e| {
        KeeperError::Integrity {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Unpack an archive into `dest`, overwriting existing files
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    info!("Extracting {} into {}", archive_path.display(), dest.display());

    let file = File::open(archive_path).map_err(|e| KeeperError::from_io(archive_path, &e))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest).map_err(|e| KeeperError::Integrity {
        path: archive_path.display().to_string(),
        reason: e.to_string(),
    })?;

    info!("Extraction complete");
    Ok(())
}
