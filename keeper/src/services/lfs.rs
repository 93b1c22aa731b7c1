//! Large-file tracking rules (`.gitattributes`) for snapshot archives

use anyhow::{anyhow, Result};
use glob::{glob, Pattern};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::constants::{lfs, snapshot};
use crate::errors::KeeperError;

/// A snapshot archive large enough to need LFS storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeArchive {
    pub path: PathBuf,
    pub size_bytes: u64,
}

pub fn needs_large_file_storage(size_bytes: u64, threshold: u64) -> bool {
    size_bytes >= threshold
}

pub fn rule_line(pattern: &str) -> String {
    format!("{} {}", pattern, lfs::RULE_ATTRIBUTES)
}

/// `path` relative to `base`, ignoring `.` components on either side.
///
/// glob drops a leading `./` from its results, so `./data/x` and `data/x`
/// must compare equal.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    fn normalized(p: &Path) -> PathBuf {
        p.components().filter(|c| !matches!(c, Component::CurDir)).collect()
    }
    normalized(path)
        .strip_prefix(normalized(base))
        .ok()
        .map(Path::to_path_buf)
}

/// Render a repository-relative path as a gitattributes pattern.
///
/// Attribute lines split on whitespace, so blanks become `[[:space:]]` (the
/// form `git lfs track` writes); wildcard characters are backslash-escaped.
pub fn escape_pattern(relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let mut pattern = String::with_capacity(joined.len());
    for ch in joined.chars() {
        match ch {
            c if c.is_whitespace() => pattern.push_str("[[:space:]]"),
            '*' | '?' | '[' | ']' | '\\' | '!' | '#' => {
                pattern.push('\\');
                pattern.push(ch);
            }
            c => pattern.push(c),
        }
    }
    pattern
}

/// The rule covering every snapshot archive in the repository
pub fn archive_glob_rule() -> String {
    rule_line(snapshot::ARCHIVE_GLOB)
}

fn read_rules(attributes: &Path) -> Result<String> {
    match fs::read_to_string(attributes) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(KeeperError::from_io(attributes, &e).into()),
    }
}

fn append_rule(attributes: &Path, existing: &str, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(attributes)
        .map_err(|e| KeeperError::from_io(attributes, &e))?;

    let prefix = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    writeln!(file, "{}{}", prefix, line).map_err(|e| KeeperError::from_io(attributes, &e))?;
    Ok(())
}

/// Declare `pattern` as LFS-tracked unless it (or the all-archives rule) is
/// already present. Returns whether the file changed.
pub fn ensure_tracking_rule(attributes: &Path, pattern: &str) -> Result<bool> {
    let existing = read_rules(attributes)?;
    let global = archive_glob_rule();
    if existing.contains(pattern) || existing.lines().any(|l| l.trim() == global) {
        debug!("Tracking rule for {} already declared", pattern);
        return Ok(false);
    }

    append_rule(attributes, &existing, &rule_line(pattern))?;
    info!("Declared LFS tracking rule for {}", pattern);
    Ok(true)
}

/// Make sure the all-archives rule is declared verbatim
pub fn force_archive_rule(attributes: &Path) -> Result<bool> {
    let existing = read_rules(attributes)?;
    let line = archive_glob_rule();
    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }

    append_rule(attributes, &existing, &line)?;
    info!("Forced LFS tracking rule for all snapshot archives");
    Ok(true)
}

/// Every `volume-data.tar.gz` below `data_root`
pub fn find_archives(data_root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        Pattern::escape(&data_root.to_string_lossy()),
        snapshot::ARCHIVE_GLOB
    );

    let mut archives = Vec::new();
    for entry in glob(&pattern).map_err(|e| anyhow!("Glob pattern error: {}", e))? {
        match entry {
            Ok(path) if path.is_file() => archives.push(path),
            Ok(_) => {}
            Err(e) => debug!("Skipping unreadable glob entry: {}", e),
        }
    }
    archives.sort();
    Ok(archives)
}

pub fn scan_large_archives(data_root: &Path, threshold: u64) -> Result<Vec<LargeArchive>> {
    let mut large = Vec::new();
    for path in find_archives(data_root)? {
        let size_bytes = fs::metadata(&path)
            .map_err(|e| KeeperError::from_io(&path, &e))?
            .len();
        if needs_large_file_storage(size_bytes, threshold) {
            large.push(LargeArchive { path, size_bytes });
        }
    }
    Ok(large)
}
