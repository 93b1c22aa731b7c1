//! Configuration loading from files and the process environment

use keeper::errors::{ConfigError, KeeperError};
use keeper::KeeperConfig;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const OVERRIDES: [&str; 4] = [
    "KEEPER_REPO_ROOT",
    "KEEPER_DATA_PATH",
    "KEEPER_REMOTE",
    "KEEPER_BRANCH",
];

fn clear_overrides() {
    for key in OVERRIDES {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_load_without_file_uses_defaults() {
    clear_overrides();
    let config = KeeperConfig::load(None).unwrap();

    assert_eq!(config.repository.root, PathBuf::from("."));
    assert_eq!(config.repository.data_path, PathBuf::from("data"));
    assert_eq!(config.workload.runtime, "docker");
    assert_eq!(config.archive.compression_level, 6);
}

#[test]
#[serial]
fn test_file_values_are_overridden_by_environment() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keeper.toml");
    fs::write(
        &path,
        r#"
        [repository]
        root = "/srv/snapshots"
        branch = "trunk"

        [workload]
        runtime = "podman"
        settle_delay_seconds = 5
        "#,
    )
    .unwrap();

    env::set_var("KEEPER_BRANCH", "hotfix");
    let config = KeeperConfig::load(Some(&path));
    clear_overrides();
    let config = config.unwrap();

    assert_eq!(config.repository.root, PathBuf::from("/srv/snapshots"));
    assert_eq!(config.repository.branch, "hotfix");
    assert_eq!(config.workload.runtime, "podman");
    assert_eq!(config.settle_delay().as_secs(), 5);
}

#[test]
#[serial]
fn test_missing_file_is_a_load_error() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let err = KeeperConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();

    let keeper_err = err.downcast_ref::<KeeperError>().unwrap();
    assert!(matches!(keeper_err, KeeperError::Config(ConfigError::LoadFailed { .. })));
    assert!(keeper_err.hint().is_some());
}

#[test]
#[serial]
fn test_invalid_values_fail_validation() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keeper.toml");
    fs::write(&path, "[push]\nmax_attempts = 0\n").unwrap();

    let err = KeeperConfig::load(Some(&path)).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<KeeperError>(),
        Some(KeeperError::Config(ConfigError::InvalidValue { field, .. }))
            if field == "push.max_attempts"
    ));
}
