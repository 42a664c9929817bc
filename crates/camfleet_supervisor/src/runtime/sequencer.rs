//! Startup sequencer: ordered stage bring-up with per-stage failure policy

use crate::runtime::command::CommandRunner;
use crate::runtime::launcher::{LaunchError, Launcher, ProbeOutcome};
use crate::runtime::process::{ExitKind, ManagedProcess};
use crate::runtime::supervisor::GroupSupervisor;
use crate::stages::{StageConfig, StagePlan};
use std::time::Duration;
use tokio::sync::watch;

/// How the sequence ended when no fatal error occurred.
#[derive(Debug, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Every enabled stage is up; hand over to the monitor loop.
    Completed,
    /// A termination request arrived between stages.
    Interrupted,
}

/// Fatal startup failures. Soft cases (no camera hardware, a user script
/// that does not come up) never surface here; the sequencer is the sole
/// place deciding fatal-vs-soft per stage.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Mandatory environment setup failed")]
    SetupFailed,

    #[error("Stage '{stage}' {exit}")]
    StageExited { stage: String, exit: ExitKind },

    #[error("Stage '{stage}' could not be launched: {source}")]
    LaunchFailed {
        stage: String,
        #[source]
        source: LaunchError,
    },
}

/// Runs the fixed startup sequence, recording every successful launch into
/// the group supervisor's live set.
pub struct Sequencer<L, R> {
    plan: StagePlan,
    launcher: L,
    runner: R,
}

impl<L: Launcher, R: CommandRunner> Sequencer<L, R> {
    pub fn new(plan: StagePlan, launcher: L, runner: R) -> Self {
        Self {
            plan,
            launcher,
            runner,
        }
    }

    /// Execute all enabled stages in order.
    ///
    /// On a fatal error the caller owns teardown of whatever was already
    /// tracked; nothing here unwinds on its own.
    pub async fn run(
        &mut self,
        supervisor: &mut GroupSupervisor,
        shutdown_rx: &watch::Receiver<()>,
    ) -> Result<SequenceOutcome, SequenceError> {
        // Stage 1: best-effort pre-kill of stale processes. Cleanup, not a
        // precondition: failures are ignored.
        for name in &self.plan.stale_process_names {
            let _ = self.runner.run(&format!("pkill -9 {name}")).await;
        }
        if settle_or_shutdown(self.plan.pre_kill_settle, shutdown_rx).await {
            return Ok(SequenceOutcome::Interrupted);
        }

        // Stage 2: mandatory virtual-camera setup.
        if !self.runner.run(&self.plan.setup_command).await {
            return Err(SequenceError::SetupFailed);
        }
        if let Some(verify) = &self.plan.setup_verify_command {
            let _ = self.runner.run(verify).await;
        }

        // Stage 3: capture pipeline, probed. The script validates hardware
        // on startup; a clean self-exit means "no camera, run without it".
        if self.plan.capture.enabled {
            let capture = self.plan.capture.clone();
            if settle_or_shutdown(capture.settle_delay, shutdown_rx).await {
                return Ok(SequenceOutcome::Interrupted);
            }
            match self.launcher.spawn_probed(&capture.spec).await {
                Ok(ProbeOutcome::Running(handle)) => {
                    supervisor.track(
                        capture.spec.name.clone(),
                        ManagedProcess::new(capture.role, capture.spec.command_line(), handle),
                    );
                }
                Ok(ProbeOutcome::Skipped { code }) => {
                    log::info!(
                        "[{}] No compatible camera (status {code}), continuing without capture",
                        capture.spec.name
                    );
                }
                Ok(ProbeOutcome::Failed(exit)) => {
                    return Err(SequenceError::StageExited {
                        stage: capture.spec.name,
                        exit,
                    });
                }
                Err(source) => {
                    return Err(SequenceError::LaunchFailed {
                        stage: capture.spec.name,
                        source,
                    });
                }
            }
        }

        // Stage 4: user scripts, sequential. Per-script failures are soft;
        // only a launch-infrastructure failure aborts the sequence.
        for script in self.plan.scripts.clone() {
            if settle_or_shutdown(script.settle_delay, shutdown_rx).await {
                return Ok(SequenceOutcome::Interrupted);
            }
            match self.launcher.spawn_probed(&script.spec).await {
                Ok(ProbeOutcome::Running(handle)) => {
                    supervisor.track(
                        script.spec.name.clone(),
                        ManagedProcess::new(script.role, script.spec.command_line(), handle),
                    );
                }
                Ok(ProbeOutcome::Skipped { code }) => {
                    log::info!("[{}] Completed with status {code}", script.spec.name);
                }
                Ok(ProbeOutcome::Failed(exit)) => {
                    log::warn!("[{}] {exit}; skipping script", script.spec.name);
                }
                Err(source) if source.is_infrastructure() => {
                    return Err(SequenceError::LaunchFailed {
                        stage: script.spec.name,
                        source,
                    });
                }
                Err(source) => {
                    log::warn!("[{}] {source}; skipping script", script.spec.name);
                }
            }
        }

        // Stages 5-7: long-running modules, fire-and-forget, each after its
        // settle delay. Any failure here is fatal.
        for stage in [
            self.plan.tracker.clone(),
            self.plan.ai_tracker.clone(),
            self.plan.vision.clone(),
        ] {
            if !stage.enabled {
                continue;
            }
            if settle_or_shutdown(stage.settle_delay, shutdown_rx).await {
                return Ok(SequenceOutcome::Interrupted);
            }
            self.launch_module(&stage, supervisor).await?;
        }

        log::info!("All enabled stages launched");
        Ok(SequenceOutcome::Completed)
    }

    async fn launch_module(
        &mut self,
        stage: &StageConfig,
        supervisor: &mut GroupSupervisor,
    ) -> Result<(), SequenceError> {
        let handle =
            self.launcher
                .spawn(&stage.spec)
                .await
                .map_err(|source| SequenceError::LaunchFailed {
                    stage: stage.spec.name.clone(),
                    source,
                })?;
        supervisor.track(
            stage.spec.name.clone(),
            ManagedProcess::new(stage.role, stage.spec.command_line(), handle),
        );
        Ok(())
    }
}

fn interrupted(shutdown_rx: &watch::Receiver<()>) -> bool {
    shutdown_rx.has_changed().unwrap_or(false)
}

/// Wait out a settle delay, waking early on a termination request.
/// True means the sequence must stop instead of launching the next stage.
async fn settle_or_shutdown(delay: Duration, shutdown_rx: &watch::Receiver<()>) -> bool {
    if interrupted(shutdown_rx) {
        return true;
    }
    if delay.is_zero() {
        return false;
    }
    // The clone carries the caller's unseen version, so a request sent at
    // any point before or during the sleep wakes the select.
    let mut rx = shutdown_rx.clone();
    tokio::select! {
        _ = tokio::time::sleep(delay) => interrupted(shutdown_rx),
        _ = rx.changed() => true,
    }
}
