//! Stop/start strategies for the workload that owns a volume
//!
//! The pipeline never evaluates caller text itself; it talks to whatever
//! [`WorkloadControl`] the orchestrator hands in.

use anyhow::{anyhow, Result};
use std::future::Future;
use tracing::info;

use crate::constants;
use crate::services::commands;

pub trait WorkloadControl {
    /// Quiesce the workload so its volume stops changing
    fn stop(&self, container: &str) -> impl Future<Output = Result<()>> + Send;

    /// Bring the workload back after a backup
    fn start(&self, container: &str) -> impl Future<Output = Result<()>> + Send;
}

/// `<runtime> stop|start <container>` through a container CLI
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    pub binary: String,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self {
            binary: constants::workload::DEFAULT_RUNTIME.to_string(),
        }
    }
}

impl ContainerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn invoke(&self, verb: &str, container: &str) -> Result<()> {
        let output = commands::run(&self.binary, [verb, container], None).await?;
        if !output.success {
            return Err(anyhow!(
                "Failed to {} container {}: {}",
                verb,
                container,
                output.diagnostics()
            ));
        }
        Ok(())
    }
}

impl WorkloadControl for ContainerRuntime {
    async fn stop(&self, container: &str) -> Result<()> {
        info!("Stopping container: {}", container);
        self.invoke("stop", container).await?;
        info!("Container {} stopped successfully", container);
        Ok(())
    }

    async fn start(&self, container: &str) -> Result<()> {
        info!("Starting container: {}", container);
        self.invoke("start", container).await?;
        info!("Container {} started successfully", container);
        Ok(())
    }
}

/// Stops with a caller-supplied shell command, restarts through the runtime.
///
/// The command sees the container reference as `$CONTAINER_REF`.
#[derive(Debug, Clone)]
pub struct CommandStopper {
    pub command: String,
    pub runtime: ContainerRuntime,
}

impl CommandStopper {
    pub fn new(command: impl Into<String>, runtime: ContainerRuntime) -> Self {
        Self {
            command: command.into(),
            runtime,
        }
    }
}

impl WorkloadControl for CommandStopper {
    async fn stop(&self, container: &str) -> Result<()> {
        info!("Stopping {} with custom command", container);
        let output =
            commands::execute_shell_command(&self.command, &[("CONTAINER_REF", container)]).await?;
        if !output.trim().is_empty() {
            info!("Stop command output: {}", output.trim());
        }
        Ok(())
    }

    async fn start(&self, container: &str) -> Result<()> {
        self.runtime.start(container).await
    }
}
