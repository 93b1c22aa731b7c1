//! Named constants for the volume persistence pipeline
//!
//! Grouped by the component that consumes them. Values that operators may want
//! to change are mirrored as defaults in [`crate::config`].

use std::time::Duration;

/// Snapshot layout constants
pub mod snapshot {
    /// File name of the compressed snapshot form inside a snapshot directory
    pub const ARCHIVE_NAME: &str = "volume-data.tar.gz";

    /// Glob matching every compressed snapshot below a data path
    pub const ARCHIVE_GLOB: &str = "**/volume-data.tar.gz";

    /// Default gzip level used when building archives
    pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
}

/// Large-file tracking constants
pub mod lfs {
    /// Archives at or above this size are stored via LFS (50 MiB)
    pub const LARGE_FILE_THRESHOLD_BYTES: u64 = 52_428_800;

    /// Tracking-rule file at the repository root
    pub const ATTRIBUTES_FILE: &str = ".gitattributes";

    /// Attributes appended after the pattern of every tracking rule
    pub const RULE_ATTRIBUTES: &str = "filter=lfs diff=lfs merge=lfs -text";
}

/// Push and retry constants
pub mod push {
    use super::Duration;

    /// Push attempts before the retry loop gives up
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Pause between push retries
    pub const RETRY_DELAY: Duration = Duration::from_secs(2);
}

/// Workload control constants
pub mod workload {
    use super::Duration;

    /// Container runtime binary used for the default stop/start invocation
    pub const DEFAULT_RUNTIME: &str = "docker";

    /// Pause after stopping the workload so it can flush its state
    pub const SETTLE_DELAY: Duration = Duration::from_secs(2);
}

/// Repository defaults
pub mod repository {
    pub const DEFAULT_REMOTE: &str = "origin";
    pub const DEFAULT_BRANCH: &str = "main";
    pub const DEFAULT_DATA_PATH: &str = "data";
    pub const DEFAULT_AUTHOR_NAME: &str = "volume-keeper[bot]";
    pub const DEFAULT_AUTHOR_EMAIL: &str = "volume-keeper@users.noreply.local";
}
