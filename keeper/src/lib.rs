//! Volume persistence for containerized workloads.
//!
//! A volume is restored from its snapshot before the workload starts, backed
//! up into the snapshot when it stops, and the snapshot tree is then
//! committed and pushed to a shared git remote.

pub mod config;
pub mod constants;
pub mod errors;
pub mod operations;
pub mod services;
pub mod types;

pub use config::{CommitterConfig, KeeperConfig};
pub use errors::{ConfigError, KeeperError};
pub use operations::backup::execute_backup_sequence;
pub use operations::commit::Committer;
pub use operations::restore::execute_restore_sequence;
pub use operations::stats::collect_stats;
