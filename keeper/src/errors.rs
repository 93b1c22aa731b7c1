//! Error taxonomy for the volume persistence pipeline
//!
//! Recoverable conditions (missing snapshot, per-file archive errors, failed
//! stop/restart) never surface here; they are logged and absorbed by the
//! operation that meets them. What remains is carried inside `anyhow::Error`
//! so callers can downcast and print [`KeeperError::hint`].

use std::fmt;

/// Main error type for the pipeline
#[derive(Debug)]
pub enum KeeperError {
    /// A required argument is missing or malformed
    InvalidArgument { field: String, reason: String },

    /// The process lacks the privilege to create or modify a path
    Permission { path: String, reason: String },

    /// A filesystem operation failed outright
    Io { path: String, reason: String },

    /// An archive failed post-write verification
    Integrity { path: String, reason: String },

    /// An external program could not be run or failed fatally
    Command { program: String, reason: String },

    /// Configuration-related errors
    Config(ConfigError),
}

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    LoadFailed { path: String, reason: String },

    /// Configuration could not be parsed
    ParseError { reason: String },

    /// A configuration value is out of range
    InvalidValue { field: String, reason: String },
}

impl KeeperError {
    pub fn invalid_argument(field: &str, reason: impl Into<String>) -> Self {
        KeeperError::InvalidArgument {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error on `path` onto `Permission` or `Io`
    pub fn from_io(path: &std::path::Path, err: &std::io::Error) -> Self {
        let path = path.display().to_string();
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            KeeperError::Permission {
                path,
                reason: err.to_string(),
            }
        } else {
            KeeperError::Io {
                path,
                reason: err.to_string(),
            }
        }
    }

    /// Actionable suggestion printed by the CLI after the error itself
    pub fn hint(&self) -> Option<String> {
        match self {
            KeeperError::Permission { path, .. } => Some(format!(
                "run with elevated privileges or grant access first, \
                 e.g. `sudo mkdir -p '{}' && sudo chown -R $(id -u):$(id -g) '{}'`",
                path, path
            )),
            KeeperError::Command { program, .. } if program == "git" => Some(
                "check that the repository is a git working tree \
                 and that the remote credentials are valid"
                    .to_string(),
            ),
            KeeperError::Command { program, .. } => {
                Some(format!("make sure `{}` is installed and on PATH", program))
            }
            KeeperError::Config(ConfigError::LoadFailed { path, .. }) => {
                Some(format!("create '{}' or omit --config to use defaults", path))
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeeperError::InvalidArgument { field, reason } => {
                write!(f, "Invalid argument '{}': {}", field, reason)
            }
            KeeperError::Permission { path, reason } => {
                write!(f, "Permission denied on '{}': {}", path, reason)
            }
            KeeperError::Io { path, reason } => {
                write!(f, "I/O error on '{}': {}", path, reason)
            }
            KeeperError::Integrity { path, reason } => {
                write!(f, "Archive '{}' failed verification: {}", path, reason)
            }
            KeeperError::Command { program, reason } => {
                write!(f, "Command '{}' failed: {}", program, reason)
            }
            KeeperError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for KeeperError {}
impl std::error::Error for ConfigError {}

impl From<ConfigError> for KeeperError {
    fn from(err: ConfigError) -> Self {
        KeeperError::Config(err)
    }
}

/// Fail fast on an empty required path argument
pub fn require_path(field: &str, value: &std::path::Path) -> Result<(), KeeperError> {
    if value.as_os_str().is_empty() {
        return Err(KeeperError::invalid_argument(field, "must not be empty"));
    }
    Ok(())
}
