//! Command-line surface of the `keeper` binary

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keeper::types::Owner;

/// Persist container volumes into a version-controlled snapshot repository
#[derive(Parser, Debug)]
#[command(name = "keeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, value_name = "PATH", env = "KEEPER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging for keeper
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Populate a volume from its snapshot before the workload starts
    Restore {
        #[command(flatten)]
        paths: VolumePaths,

        /// Ownership applied to the restored volume
        #[arg(long, value_name = "UID:GID", env = "VOLUME_OWNER")]
        owner: Option<Owner>,
    },

    /// Replace the snapshot with the current volume contents
    Backup {
        #[command(flatten)]
        paths: VolumePaths,

        #[command(flatten)]
        workload: WorkloadArgs,

        /// Write the mirrored tree instead of a compressed archive
        #[arg(long)]
        no_compress: bool,
    },

    /// Commit the snapshot tree and push it to the remote
    Commit {
        #[arg(long, short, env = "COMMIT_MESSAGE")]
        message: Option<String>,
    },

    /// Backup followed by commit
    Save {
        #[command(flatten)]
        paths: VolumePaths,

        #[command(flatten)]
        workload: WorkloadArgs,

        #[arg(long)]
        no_compress: bool,

        #[arg(long, short, env = "COMMIT_MESSAGE")]
        message: Option<String>,
    },

    /// Report volume size and snapshot compression
    Stats {
        #[arg(long, value_name = "PATH", env = "VOLUME_PATH")]
        volume: PathBuf,

        #[arg(long, value_name = "PATH", env = "SNAPSHOT_PATH")]
        snapshot: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct VolumePaths {
    /// Live volume directory
    #[arg(long, value_name = "PATH", env = "VOLUME_PATH")]
    pub volume: PathBuf,

    /// Snapshot directory inside the tracked tree
    #[arg(long, value_name = "PATH", env = "SNAPSHOT_PATH")]
    pub snapshot: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WorkloadArgs {
    /// Container to stop during the backup and restart afterwards
    #[arg(long, value_name = "REF", env = "CONTAINER_REF")]
    pub container: Option<String>,

    /// Shell command used instead of `<runtime> stop`
    #[arg(long, value_name = "CMD", env = "STOP_COMMAND", requires = "container")]
    pub stop_command: Option<String>,
}
