//! Camfleet Process Supervisor
//!
//! Brings up the camfleet camera/vision subprocess fleet in a fixed order,
//! watches for the first child exit, and tears the whole group down so an
//! outer service manager can restart the sequence from scratch.
//!
//! # Overview
//!
//! The supervisor performs, in order:
//! - a best-effort pre-kill of stale processes from a previous run
//! - the mandatory virtual-camera setup step (fatal on failure)
//! - a probed launch of the capture pipeline (skipped cleanly when no
//!   compatible camera hardware is present)
//! - probed launches of any user scripts queued with `--execute`
//! - fire-and-forget launches of the tracker, AI tracker and main vision
//!   modules, each after its settle delay
//!
//! Once every enabled stage is up, the group supervisor blocks until any
//! child exits. Partial operation is not a defined state for this fleet:
//! one crash tears everything down and the process exits non-zero, leaving
//! the restart decision to the service manager.

pub mod cli;
pub mod runtime;
pub mod stages;

pub use cli::SupervisorArgs;
pub use runtime::{
    CommandRunner, ExitKind, GroupSupervisor, LaunchError, LaunchSpec, Launcher, ManagedProcess,
    MonitorOutcome, ProbeOutcome, ProcessHandle, ProcessLauncher, SequenceError, SequenceOutcome,
    Sequencer, ShellRunner,
};
pub use stages::{StageConfig, StagePlan, StageRole};
