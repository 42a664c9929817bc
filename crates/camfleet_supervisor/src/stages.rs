//! Stage configuration and the deployment launch plan
//!
//! A [`StagePlan`] is derived once from the CLI arguments and consumed once
//! by the sequencer. Module paths and settle delays are fixed deployment
//! constants: each module probes for resources (virtual video device nodes,
//! camera hardware) created by the previous stage, and "wait N seconds" is
//! the only readiness signal the fleet provides.

use crate::cli::SupervisorArgs;
use crate::runtime::LaunchSpec;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment root for the camfleet modules.
const BASE_DIR: &str = "/opt/camfleet";

/// Settle after the pre-kill sweep, so signaled processes release devices.
const PRE_KILL_SETTLE: Duration = Duration::from_secs(2);
/// Settle before the tracker, while the capture pipeline opens its devices.
const TRACKER_SETTLE: Duration = Duration::from_secs(15);
/// Settle before the AI tracker.
const AI_TRACKER_SETTLE: Duration = Duration::from_secs(5);
/// Settle before the main vision module.
const VISION_SETTLE: Duration = Duration::from_secs(5);

/// Process names a previous run may have left behind; also the targets of
/// the name-sweep teardown strategy.
const STALE_PROCESS_NAMES: [&str; 4] =
    ["cam-capture", "tracker_core", "ai_tracker_core", "vision_core"];

/// Role of a managed process within the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    CapturePipeline,
    Tracker,
    AiTracker,
    VisionModule,
    UserScript,
}

impl std::fmt::Display for StageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StageRole::CapturePipeline => "capture pipeline",
            StageRole::Tracker => "tracker",
            StageRole::AiTracker => "ai tracker",
            StageRole::VisionModule => "vision module",
            StageRole::UserScript => "user script",
        };
        f.write_str(label)
    }
}

/// One ordered step of the startup sequence.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Role label for tracking and logging
    pub role: StageRole,
    /// Whether the stage runs at all
    pub enabled: bool,
    /// Fixed pause before the stage begins
    pub settle_delay: Duration,
    /// What to launch
    pub spec: LaunchSpec,
}

/// The full ordered launch plan consumed by the sequencer.
#[derive(Debug, Clone)]
pub struct StagePlan {
    /// Process names to pre-kill before anything starts
    pub stale_process_names: Vec<String>,
    /// Pause after the pre-kill sweep
    pub pre_kill_settle: Duration,
    /// Mandatory environment setup (virtual camera kernel module)
    pub setup_command: String,
    /// Informational check after setup, never fatal
    pub setup_verify_command: Option<String>,
    /// Capture pipeline stage (probed launch)
    pub capture: StageConfig,
    /// User scripts, launched sequentially (probed launch each)
    pub scripts: Vec<StageConfig>,
    /// Tracker module stage
    pub tracker: StageConfig,
    /// AI tracker module stage
    pub ai_tracker: StageConfig,
    /// Main vision module stage
    pub vision: StageConfig,
}

impl StagePlan {
    /// Derive the plan from CLI arguments, using the deployment constants.
    pub fn from_args(args: &SupervisorArgs) -> Self {
        let mut capture_args = Vec::new();
        if let Some(path) = &args.postprocess_file_path {
            capture_args.push(path.clone());
        }

        let scripts = args
            .execute
            .iter()
            .map(|path| StageConfig {
                role: StageRole::UserScript,
                enabled: true,
                settle_delay: Duration::ZERO,
                spec: LaunchSpec {
                    name: format!("script:{path}"),
                    program: path.clone(),
                    args: Vec::new(),
                    working_dir: None,
                },
            })
            .collect();

        Self {
            stale_process_names: STALE_PROCESS_NAMES.iter().map(|s| s.to_string()).collect(),
            pre_kill_settle: PRE_KILL_SETTLE,
            setup_command: format!("{BASE_DIR}/scripts/create_virtual_cams.sh"),
            setup_verify_command: Some(
                "ls /sys/devices/virtual/video4linux/".to_string(),
            ),
            capture: StageConfig {
                role: StageRole::CapturePipeline,
                enabled: args.enable_local_cam_capture,
                settle_delay: Duration::ZERO,
                spec: LaunchSpec {
                    name: "capture".to_string(),
                    program: format!("{BASE_DIR}/scripts/run_capture_pipeline.sh"),
                    args: capture_args,
                    working_dir: None,
                },
            },
            scripts,
            tracker: StageConfig {
                role: StageRole::Tracker,
                enabled: args.enable_tracker,
                settle_delay: TRACKER_SETTLE,
                spec: module_spec("tracker", "tracking", "tracker_core"),
            },
            ai_tracker: StageConfig {
                role: StageRole::AiTracker,
                enabled: args.enable_ai_tracker,
                settle_delay: AI_TRACKER_SETTLE,
                spec: module_spec("ai_tracker", "ai_tracking", "ai_tracker_core"),
            },
            vision: StageConfig {
                role: StageRole::VisionModule,
                enabled: !args.disable_de_camera,
                settle_delay: VISION_SETTLE,
                spec: module_spec("vision", "vision", "vision_core"),
            },
        }
    }
}

/// Build the launch spec for a long-running module: `<module> -c <config>`
/// with the working directory set to the module's own directory.
fn module_spec(name: &str, subdir: &str, binary: &str) -> LaunchSpec {
    let module_dir = format!("{BASE_DIR}/{subdir}");
    LaunchSpec {
        name: name.to_string(),
        program: format!("{module_dir}/{binary}"),
        args: vec![
            "-c".to_string(),
            format!("{module_dir}/{binary}.config.module.json"),
        ],
        working_dir: Some(PathBuf::from(module_dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SupervisorArgs;
    use argh::FromArgs;

    fn args(list: &[&str]) -> SupervisorArgs {
        SupervisorArgs::from_args(&["camfleet_supervisor"], list)
            .expect("arguments should parse")
    }

    #[test]
    fn test_default_plan_only_vision_enabled() {
        let plan = StagePlan::from_args(&args(&[]));
        assert!(!plan.capture.enabled);
        assert!(!plan.tracker.enabled);
        assert!(!plan.ai_tracker.enabled);
        assert!(plan.vision.enabled);
        assert!(plan.scripts.is_empty());
    }

    #[test]
    fn test_disable_vision_stage() {
        let plan = StagePlan::from_args(&args(&["-d"]));
        assert!(!plan.vision.enabled);
    }

    #[test]
    fn test_postprocess_path_forwarded_to_capture() {
        let plan = StagePlan::from_args(&args(&["-c", "/tmp/post.json"]));
        assert!(plan.capture.enabled);
        assert_eq!(plan.capture.spec.args, vec!["/tmp/post.json"]);
    }

    #[test]
    fn test_scripts_keep_cli_order() {
        let plan = StagePlan::from_args(&args(&["-e", "/opt/a.sh", "-e", "/opt/b.sh"]));
        let names: Vec<&str> = plan.scripts.iter().map(|s| s.spec.name.as_str()).collect();
        assert_eq!(names, vec!["script:/opt/a.sh", "script:/opt/b.sh"]);
    }

    #[test]
    fn test_module_spec_shape() {
        let plan = StagePlan::from_args(&args(&["-t"]));
        let spec = &plan.tracker.spec;
        assert_eq!(spec.program, "/opt/camfleet/tracking/tracker_core");
        assert_eq!(spec.args[0], "-c");
        assert!(spec.working_dir.is_some());
    }
}
