use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{Cli, Command, VolumePaths, WorkloadArgs};
use keeper::operations::commit::failure_hint;
use keeper::services::git::GitRepository;
use keeper::services::workload::{CommandStopper, ContainerRuntime};
use keeper::types::{BackupOutcome, BackupRequest, CommitOutcome, RestoreOutcome, RestoreRequest};
use keeper::{
    collect_stats, execute_backup_sequence, execute_restore_sequence, Committer, KeeperConfig,
    KeeperError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            if let Some(hint) = e.downcast_ref::<KeeperError>().and_then(KeeperError::hint) {
                error!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "keeper=debug" } else { "keeper=info" };
    let env_filter = EnvFilter::from_default_env().add_directive(level.parse()?);

    fmt().with_env_filter(env_filter).with_target(false).init();
    Ok(())
}

/// `Ok(false)` means the command finished with a reportable failure
async fn run(cli: Cli) -> Result<bool> {
    let config = KeeperConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Restore { paths, owner } => {
            let request = RestoreRequest {
                volume_path: paths.volume,
                snapshot_path: paths.snapshot,
                owner,
            };
            match execute_restore_sequence(&request).await? {
                RestoreOutcome::Restored { encoding } => {
                    info!("✓ Volume restored from {}", encoding)
                }
                RestoreOutcome::Empty => info!("✓ No snapshot yet, volume left empty"),
            }
            Ok(true)
        }

        Command::Backup {
            paths,
            workload,
            no_compress,
        } => {
            backup(&config, paths, workload, no_compress).await?;
            Ok(true)
        }

        Command::Commit { message } => commit(&config, message.as_deref()).await,

        Command::Save {
            paths,
            workload,
            no_compress,
            message,
        } => {
            backup(&config, paths, workload, no_compress).await?;
            commit(&config, message.as_deref()).await
        }

        Command::Stats {
            volume,
            snapshot,
            json,
        } => {
            let report = collect_stats(&volume, snapshot.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Volume:      {}", volume.display());
                println!("Files:       {}", report.file_count);
                println!("Size:        {:.2} MB", report.size_bytes as f64 / 1024.0 / 1024.0);
                if let Some(compressed) = report.compressed_size_bytes {
                    println!("Compressed:  {:.2} MB", compressed as f64 / 1024.0 / 1024.0);
                }
                if let Some(ratio) = report.ratio {
                    println!("Ratio:       {:.1}%", ratio);
                }
            }
            Ok(true)
        }
    }
}

async fn backup(
    config: &KeeperConfig,
    paths: VolumePaths,
    workload: WorkloadArgs,
    no_compress: bool,
) -> Result<BackupOutcome> {
    let mut request = BackupRequest::new(paths.volume, paths.snapshot);
    request.container = workload.container;
    request.compress = config.archive.enabled && !no_compress;
    request.compression_level = config.archive.compression_level;
    request.settle_delay = config.settle_delay();

    let runtime = ContainerRuntime::new(config.workload.runtime.as_str());
    let outcome = match workload.stop_command {
        Some(command) => {
            let stopper = CommandStopper::new(command, runtime);
            execute_backup_sequence(&request, &stopper).await?
        }
        None => execute_backup_sequence(&request, &runtime).await?,
    };

    match &outcome {
        BackupOutcome::Backed {
            encoding,
            size_bytes,
        } => info!(
            "✓ Snapshot written as {} ({:.1} MB)",
            encoding,
            *size_bytes as f64 / 1024.0 / 1024.0
        ),
        BackupOutcome::Skipped => info!("Nothing to back up"),
    }
    Ok(outcome)
}

async fn commit(config: &KeeperConfig, message: Option<&str>) -> Result<bool> {
    let settings = config.committer();
    let repo = GitRepository::new(settings.repo_root.clone());
    let committer = Committer::new(repo, settings);

    match committer.commit_and_push(message).await? {
        CommitOutcome::Pushed { .. } | CommitOutcome::NoChanges => Ok(true),
        CommitOutcome::Failed { reason } => {
            error!("Snapshot push failed: {}", reason);
            if let Some(hint) = failure_hint(&reason) {
                error!("Hint: {}", hint);
            }
            Ok(false)
        }
    }
}
