//! One-shot shell command execution

use async_trait::async_trait;
use tokio::process::Command;

/// Runs a one-shot external command to completion.
///
/// Injectable so the sequencer can be exercised with a recording fake; the
/// production implementation shells out like the setup scripts expect.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute the command line synchronously, true iff it exited 0.
    async fn run(&self, command_line: &str) -> bool;
}

/// Executes via `sh -c`, inheriting the parent's standard streams so the
/// command output lands in the operator's journal.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command_line: &str) -> bool {
        log::info!("Executing: {command_line}");
        match Command::new("sh").arg("-c").arg(command_line).status().await {
            Ok(status) if status.success() => true,
            Ok(status) => {
                log::error!("Command failed with {status}: {command_line}");
                false
            }
            Err(e) => {
                log::error!("Failed to execute '{command_line}': {e}");
                false
            }
        }
    }
}
