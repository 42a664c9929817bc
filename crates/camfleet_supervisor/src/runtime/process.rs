//! Managed process handles and exit classification

use crate::stages::StageRole;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Child;

/// What to launch for one stage.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Stage name (live-set key, used for logging)
    pub name: String,
    /// Executable or script path
    pub program: String,
    /// Command line arguments
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// The full command line, for logging.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// How a child process left the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Exited normally with a status code
    Code(i32),
    /// Terminated by a signal
    Signaled(i32),
    /// Exit reason could not be determined
    Unknown,
}

impl ExitKind {
    /// True for a clean exit with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitKind::Code(0))
    }
}

impl From<std::process::ExitStatus> for ExitKind {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitKind::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return ExitKind::Signaled(sig);
            }
        }
        ExitKind::Unknown
    }
}

impl std::fmt::Display for ExitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitKind::Code(code) => write!(f, "exited with status {code}"),
            ExitKind::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            ExitKind::Unknown => write!(f, "exited for unknown reason"),
        }
    }
}

/// Handle to a spawned OS process.
///
/// Holds the child for processes this supervisor spawned itself. A handle
/// built with [`ProcessHandle::from_pid`] tracks a PID without owning the
/// child; it can be signaled but never reports an exit.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    child: Option<Child>,
}

impl ProcessHandle {
    /// Wrap a freshly spawned child.
    pub fn new(pid: u32, child: Child) -> Self {
        Self {
            pid,
            child: Some(child),
        }
    }

    /// Track a PID without owning the child process.
    pub fn from_pid(pid: u32) -> Self {
        Self { pid, child: None }
    }

    /// Process ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking status check. `None` means still running.
    ///
    /// A polling error is reported as [`ExitKind::Unknown`]: the handle is
    /// no longer observable and must be treated as dead.
    pub fn try_reap(&mut self) -> Option<ExitKind> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => Some(ExitKind::from(status)),
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to poll process {}: {e}", self.pid);
                Some(ExitKind::Unknown)
            }
        }
    }

    /// Best-effort SIGTERM, without waiting for the process to exit.
    pub fn signal_term(&self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM);
        }
    }
}

/// A live, supervisor-tracked child process.
#[derive(Debug)]
pub struct ManagedProcess {
    /// Role within the fleet
    pub role: StageRole,
    /// Command line it was launched with
    pub command: String,
    /// OS process handle
    pub handle: ProcessHandle,
    /// When the launch succeeded
    pub started_at: Instant,
}

impl ManagedProcess {
    /// Record a successful launch.
    pub fn new(role: StageRole, command: String, handle: ProcessHandle) -> Self {
        Self {
            role,
            command,
            handle,
            started_at: Instant::now(),
        }
    }

    /// Time since the launch succeeded.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(command: &str) -> std::process::ExitStatus {
        std::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .expect("sh should run")
    }

    #[test]
    fn test_exit_kind_from_code() {
        assert_eq!(ExitKind::from(status_of("exit 0")), ExitKind::Code(0));
        assert_eq!(ExitKind::from(status_of("exit 3")), ExitKind::Code(3));
        assert!(ExitKind::Code(0).is_success());
        assert!(!ExitKind::Code(3).is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_kind_from_signal() {
        // The shell kills itself with SIGKILL (9).
        let status = status_of("kill -9 $$");
        assert_eq!(ExitKind::from(status), ExitKind::Signaled(9));
    }

    #[test]
    fn test_external_handle_never_reaps() {
        let mut handle = ProcessHandle::from_pid(424242);
        assert_eq!(handle.try_reap(), None);
    }

    #[tokio::test]
    async fn test_try_reap_running_then_exited() {
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg("sleep 0.1; exit 7")
            .spawn()
            .expect("spawn should succeed");
        let pid = child.id().unwrap_or(0);
        let mut handle = ProcessHandle::new(pid, child);

        assert_eq!(handle.try_reap(), None);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(handle.try_reap(), Some(ExitKind::Code(7)));
    }

    #[test]
    fn test_command_line_rendering() {
        let spec = LaunchSpec {
            name: "tracker".to_string(),
            program: "/opt/camfleet/tracking/tracker_core".to_string(),
            args: vec!["-c".to_string(), "cfg.json".to_string()],
            working_dir: None,
        };
        assert_eq!(
            spec.command_line(),
            "/opt/camfleet/tracking/tracker_core -c cfg.json"
        );
    }
}
