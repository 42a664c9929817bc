//! Child process launching, fire-and-forget and probed variants

use crate::runtime::process::{ExitKind, LaunchSpec, ProcessHandle};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::process::Command;

/// Grace period before the probed launch checks whether its child is still
/// alive. Fixed, not adaptive: a program that takes longer than this to
/// fail is reported as running and caught later by the reap loop.
pub const PROBE_GRACE: Duration = Duration::from_millis(500);

/// Exit status the capture pipeline uses for "no compatible hardware".
pub const NO_HARDWARE_STATUS: i32 = 2;

/// Result of a probed launch.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Still alive after the grace period
    Running(ProcessHandle),
    /// Self-terminated cleanly within the grace period: the capability is
    /// not available (no camera hardware) or the script already finished.
    /// Not an error.
    Skipped { code: i32 },
    /// Exited non-zero or was killed within the grace period
    Failed(ExitKind),
}

/// Errors creating a new process.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to spawn '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// True when the OS could not create a process at all (fatal to the
    /// whole sequence), as opposed to a bad target program (soft for user
    /// scripts). `spawn` conflates fork and exec failures, so the split is
    /// made on the error kind.
    pub fn is_infrastructure(&self) -> bool {
        let LaunchError::Spawn { source, .. } = self;
        !matches!(
            source.kind(),
            io::ErrorKind::NotFound
                | io::ErrorKind::PermissionDenied
                | io::ErrorKind::InvalidInput
        )
    }
}

/// Spawns stage processes.
///
/// Injectable so the sequencer's stage policy can be tested against a fake
/// that records calls instead of forking.
#[async_trait]
pub trait Launcher: Send {
    /// Fire-and-forget launch; failures surface later via the reap loop.
    async fn spawn(&mut self, spec: &LaunchSpec) -> Result<ProcessHandle, LaunchError>;

    /// Launch, wait the fixed grace period, then check liveness once.
    async fn spawn_probed(&mut self, spec: &LaunchSpec) -> Result<ProbeOutcome, LaunchError>;
}

/// The real launcher over [`tokio::process::Command`].
///
/// Children inherit the parent's standard streams so their output reaches
/// the operator/journal directly.
pub struct ProcessLauncher {
    grace: Duration,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self { grace: PROBE_GRACE }
    }

    /// Override the probe grace period (tests).
    pub fn with_grace(grace: Duration) -> Self {
        Self { grace }
    }

    fn spawn_child(&self, spec: &LaunchSpec) -> Result<ProcessHandle, LaunchError> {
        let mut cmd = Command::new(&spec.program);
        // No kill_on_drop: teardown is an explicit SIGTERM and the child
        // keeps its graceful-shutdown window; the outer service manager
        // reaps whatever outlives the supervisor.
        cmd.args(&spec.args);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| LaunchError::Spawn {
            name: spec.name.clone(),
            source: e,
        })?;
        let pid = child.id().unwrap_or(0);
        log::info!("[{}] Started with PID {pid}: {}", spec.name, spec.command_line());
        Ok(ProcessHandle::new(pid, child))
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn spawn(&mut self, spec: &LaunchSpec) -> Result<ProcessHandle, LaunchError> {
        self.spawn_child(spec)
    }

    async fn spawn_probed(&mut self, spec: &LaunchSpec) -> Result<ProbeOutcome, LaunchError> {
        let mut handle = self.spawn_child(spec)?;
        tokio::time::sleep(self.grace).await;

        match handle.try_reap() {
            None => Ok(ProbeOutcome::Running(handle)),
            Some(ExitKind::Code(code)) if code == 0 || code == NO_HARDWARE_STATUS => {
                Ok(ProbeOutcome::Skipped { code })
            }
            Some(kind) => Ok(ProbeOutcome::Failed(kind)),
        }
    }
}
