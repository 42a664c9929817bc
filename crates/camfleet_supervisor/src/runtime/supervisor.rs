//! Group supervisor: live-set ownership, crash detection and teardown

use crate::runtime::command::CommandRunner;
use crate::runtime::process::{ExitKind, ManagedProcess};
use indexmap::IndexMap;
use std::time::Duration;
use tokio::sync::watch;

/// How often the monitor polls the live set for exits.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Why the monitor loop returned.
#[derive(Debug)]
pub enum MonitorOutcome {
    /// A tracked child exited; the group is no longer viable.
    ChildExited { name: String, exit: ExitKind },
    /// An external termination request arrived.
    ShutdownRequested,
    /// Nothing was being tracked when monitoring began.
    Idle,
}

/// Owns the set of live managed processes.
///
/// All mutation happens on the single supervisor control flow; the signal
/// path only sends on a channel and the actual teardown runs here.
#[derive(Default)]
pub struct GroupSupervisor {
    live: IndexMap<String, ManagedProcess>,
}

impl GroupSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful launch into the live set.
    pub fn track(&mut self, name: impl Into<String>, process: ManagedProcess) {
        let name = name.into();
        log::info!(
            "[{name}] Tracking {} (PID {})",
            process.role,
            process.handle.pid()
        );
        self.live.insert(name, process);
    }

    /// Number of live tracked processes.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether a stage is currently tracked.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.live.contains_key(name)
    }

    /// Block until any tracked child exits or shutdown is requested.
    ///
    /// This is the program's main event loop. The first observed exit is
    /// classified, logged and removed from the live set; deciding what to
    /// do about it (always: tear down and exit non-zero) is the caller's.
    pub async fn monitor(&mut self, mut shutdown_rx: watch::Receiver<()>) -> MonitorOutcome {
        if self.live.is_empty() {
            log::info!("No processes to supervise");
            return MonitorOutcome::Idle;
        }

        log::info!("Supervising {} processes", self.live.len());
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    log::info!("Shutdown signal received");
                    return MonitorOutcome::ShutdownRequested;
                }

                _ = tokio::time::sleep(REAP_POLL_INTERVAL) => {
                    if let Some((name, exit)) = self.reap_one() {
                        return MonitorOutcome::ChildExited { name, exit };
                    }
                }
            }
        }
    }

    /// Poll every live handle once; on the first exit found, remove it from
    /// the live set and report it.
    fn reap_one(&mut self) -> Option<(String, ExitKind)> {
        let exited = self.live.iter_mut().find_map(|(name, process)| {
            process.handle.try_reap().map(|exit| (name.clone(), exit))
        })?;

        let (name, exit) = exited;
        if let Some(process) = self.live.shift_remove(&name) {
            // A clean exit still kills the group, but it is not an error
            // of the child's own making.
            if exit.is_success() {
                log::warn!("[{name}] {} after {:.1?} uptime", exit, process.uptime());
            } else {
                log::error!("[{name}] {} after {:.1?} uptime", exit, process.uptime());
            }
        }
        Some((name, exit))
    }

    /// Send SIGTERM to every live handle, without waiting for any of them
    /// to finish exiting. Idempotent: the live set is drained, so a second
    /// invocation is a no-op.
    pub fn teardown_all(&mut self) {
        if self.live.is_empty() {
            return;
        }
        log::info!("Tearing down {} processes", self.live.len());
        for (name, process) in self.live.drain(..) {
            log::info!("[{name}] Stopping PID {}", process.handle.pid());
            process.handle.signal_term();
        }
    }

    /// Broader teardown strategy: kill every known process name via the
    /// command runner, trading precision for robustness against PID
    /// bookkeeping drift. Also drains the live set.
    pub async fn teardown_by_name(&mut self, runner: &dyn CommandRunner, names: &[String]) {
        log::info!("Tearing down by process name: {}", names.join(", "));
        for name in names {
            // Best-effort: pkill exits 1 when nothing matched.
            let _ = runner.run(&format!("pkill -9 {name}")).await;
        }
        self.live.drain(..);
    }
}
