//! Volume trees for round-trip tests

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Write a small game-server style volume below `root`
pub fn populate_volume(root: &Path) {
    fs::create_dir_all(root.join("world/region")).unwrap();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("logs")).unwrap();

    fs::write(root.join("server.properties"), "motd=keeper test\nmax-players=8\n").unwrap();
    fs::write(root.join("world/level.dat"), [0u8, 1, 2, 3, 255, 254]).unwrap();
    fs::write(root.join("config/ops.json"), r#"[{"name":"admin"}]"#).unwrap();

    // incompressible-ish payload so the archive is not trivially small
    let region: Vec<u8> = (0..64 * 1024u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();
    fs::write(root.join("world/region/r.0.0.mca"), region).unwrap();
}

/// Relative path -> file content (directories map to `None`)
pub fn tree_contents(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    let mut contents = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
        let value = if entry.file_type().is_file() {
            Some(fs::read(entry.path()).unwrap())
        } else {
            None
        };
        contents.insert(rel, value);
    }
    contents
}

pub fn assert_same_tree(expected: &Path, actual: &Path) {
    assert_eq!(
        tree_contents(expected),
        tree_contents(actual),
        "{} and {} differ",
        expected.display(),
        actual.display()
    );
}

/// Names directly inside `dir`, sorted
pub fn top_level_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn is_empty_dir(dir: &Path) -> bool {
    dir.is_dir() && fs::read_dir(dir).unwrap().next().is_none()
}
