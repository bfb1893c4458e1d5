//! Shell command execution for synth and build steps

use crate::error::{Result, RunError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::Command;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one shell command in `cwd` with `env` added to the inherited
    /// environment. Non-zero exit is an error.
    async fn run(&self, command: &str, cwd: &Path, env: &BTreeMap<String, String>) -> Result<()>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Default, Clone)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str, cwd: &Path, env: &BTreeMap<String, String>) -> Result<()> {
        tracing::debug!(command, cwd = %cwd.display(), "running");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .envs(env)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RunError::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
