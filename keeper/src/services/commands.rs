use anyhow::Result;
use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::errors::KeeperError;

/// Captured result of an external program run
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stderr if the program wrote any, stdout otherwise
    pub fn diagnostics(&self) -> &str {
        if !self.stderr.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        }
    }
}

/// Run `program` to completion. A non-zero exit is reported in the output,
/// only a failure to spawn is an error.
pub async fn run<I, S>(program: &str, args: I, cwd: Option<&Path>) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = AsyncCommand::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    debug!("Executing command: {:?}", command.as_std());

    let output = command.output().await.map_err(|e| KeeperError::Command {
        program: program.to_string(),
        reason: format!("failed to spawn: {}", e),
    })?;

    Ok(CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Like [`run`], but a non-zero exit becomes a `KeeperError::Command`
pub async fn run_checked<I, S>(program: &str, args: I, cwd: Option<&Path>) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run(program, args, cwd).await?;
    if output.success {
        Ok(output.stdout)
    } else {
        Err(KeeperError::Command {
            program: program.to_string(),
            reason: format!("exit code {}: {}", output.exit_code, output.diagnostics()),
        }
        .into())
    }
}

/// Run a caller-supplied shell snippet with extra environment variables
pub async fn execute_shell_command(command: &str, envs: &[(&str, &str)]) -> Result<String> {
    debug!("Executing shell command: {}", command);

    let output = AsyncCommand::new("sh")
        .arg("-c")
        .arg(command)
        .envs(envs.iter().copied())
        .output()
        .await
        .map_err(|e| KeeperError::Command {
            program: "sh".to_string(),
            reason: format!("failed to spawn: {}", e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        Ok(stdout)
    } else {
        let error_msg = if !stderr.is_empty() { stderr } else { stdout };
        Err(KeeperError::Command {
            program: "sh".to_string(),
            reason: error_msg.trim().to_string(),
        }
        .into())
    }
}
