//! Camfleet Supervisor CLI
//!
//! Usage:
//!   camfleet_supervisor                  # vision module only
//!   camfleet_supervisor -c -t            # capture pipeline + tracker + vision
//!   camfleet_supervisor -e /opt/env.sh   # queue a user script
//!
//! Exit codes: 0 for a version query or an external termination request,
//! 1 for any fatal startup failure or detected child crash.

use camfleet_supervisor::{
    GroupSupervisor, MonitorOutcome, ProcessLauncher, SequenceOutcome, Sequencer, ShellRunner,
    StagePlan, SupervisorArgs,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args: SupervisorArgs = argh::from_env();

    if args.version {
        println!("camfleet_supervisor {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // Initialize logging
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let plan = StagePlan::from_args(&args);
    let stale_names = plan.stale_process_names.clone();

    // The handler only records the request; teardown runs on the main
    // control flow, never in signal context.
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Termination requested, shutting down...");
        let _ = shutdown_tx.send(());
    })
    .expect("Error setting termination handler");

    let mut supervisor = GroupSupervisor::new();
    let mut sequencer = Sequencer::new(plan, ProcessLauncher::new(), ShellRunner);

    match sequencer.run(&mut supervisor, &shutdown_rx).await {
        Ok(SequenceOutcome::Completed) => {}
        Ok(SequenceOutcome::Interrupted) => {
            supervisor.teardown_all();
            std::process::exit(0);
        }
        Err(e) => {
            log::error!("CRITICAL: {e}. Exiting.");
            supervisor.teardown_all();
            std::process::exit(1);
        }
    }

    match supervisor.monitor(shutdown_rx).await {
        MonitorOutcome::ChildExited { name, exit } => {
            log::error!(
                "[{name}] {exit}. Crashing the supervisor to force a full service restart."
            );
            supervisor.teardown_all();
            std::process::exit(1);
        }
        MonitorOutcome::ShutdownRequested => {
            // Name sweep over per-PID signaling: more reliable when PID
            // bookkeeping has drifted.
            supervisor.teardown_by_name(&ShellRunner, &stale_names).await;
            std::process::exit(0);
        }
        MonitorOutcome::Idle => {
            log::info!("Camfleet supervisor exiting");
        }
    }
}
