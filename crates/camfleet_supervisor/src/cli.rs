//! Command-line interface for the camfleet supervisor

use argh::FromArgs;

/// Process supervisor for the camfleet capture, tracking and vision modules
#[derive(FromArgs, Debug)]
pub struct SupervisorArgs {
    /// enable the local camera capture pipeline stage
    #[argh(switch, short = 'c')]
    pub enable_local_cam_capture: bool,

    /// enable the tracker module stage
    #[argh(switch, short = 't')]
    pub enable_tracker: bool,

    /// enable the AI tracker module stage
    #[argh(switch, short = 'a')]
    pub enable_ai_tracker: bool,

    /// disable the main vision module stage (enabled by default)
    #[argh(switch, short = 'd')]
    pub disable_de_camera: bool,

    /// queue a user script for sequential launch (repeatable)
    #[argh(option, short = 'e')]
    pub execute: Vec<String>,

    /// print version and exit
    #[argh(switch, short = 'v')]
    pub version: bool,

    /// optional post-process file forwarded to the capture pipeline
    #[argh(positional)]
    pub postprocess_file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> SupervisorArgs {
        SupervisorArgs::from_args(&["camfleet_supervisor"], args)
            .expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!(!args.enable_local_cam_capture);
        assert!(!args.enable_tracker);
        assert!(!args.enable_ai_tracker);
        assert!(!args.disable_de_camera);
        assert!(args.execute.is_empty());
        assert!(args.postprocess_file_path.is_none());
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&["-c", "-t", "-a", "-d"]);
        assert!(args.enable_local_cam_capture);
        assert!(args.enable_tracker);
        assert!(args.enable_ai_tracker);
        assert!(args.disable_de_camera);
    }

    #[test]
    fn test_repeatable_execute() {
        let args = parse(&["-e", "/opt/a.sh", "--execute", "/opt/b.sh"]);
        assert_eq!(args.execute, vec!["/opt/a.sh", "/opt/b.sh"]);
    }

    #[test]
    fn test_positional_postprocess_path() {
        let args = parse(&["-c", "/usr/share/camera-assets/mobilenet.json"]);
        assert_eq!(
            args.postprocess_file_path.as_deref(),
            Some("/usr/share/camera-assets/mobilenet.json")
        );
    }
}
