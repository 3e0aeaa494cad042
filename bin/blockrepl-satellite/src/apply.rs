//! Invocation of the replication admin and setup tools

use crate::retry::{CommandOutput, RetryIfDeviceBusy};
use anyhow::{Context, Result, bail};
use blockrepl_common::config::ApplyConfig;
use tokio::process::Command;
use tracing::{debug, info};

/// Run a tool once and capture its output
pub async fn run_command(program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
    debug!(program, ?args, "Running external command");
    let output = Command::new(program).args(args).output().await?;
    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Bring the running resource in line with its configuration file
pub async fn adjust(config: &ApplyConfig, resource: &str) -> Result<()> {
    let policy = RetryIfDeviceBusy::new(config.retry_count, config.retry_delay());
    let args = ["adjust", resource];
    let output = policy
        .run(|| run_command(&config.drbdadm_path, &args))
        .await
        .with_context(|| format!("Failed to run {}", config.drbdadm_path))?;

    if !output.success {
        bail!(
            "{} adjust {resource} failed: {}",
            config.drbdadm_path,
            output.stderr.trim()
        );
    }
    info!(resource, "Adjusted resource");
    Ok(())
}
