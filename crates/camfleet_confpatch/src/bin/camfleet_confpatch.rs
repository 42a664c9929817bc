//! Camfleet Config Patcher CLI
//!
//! Usage:
//!   camfleet_confpatch <username> <access_code> <server> <config_file>...
//!
//! An empty string for any of the three values leaves that field untouched.
//! Exits 0 only when every file was patched without error.

use argh::FromArgs;
use camfleet_confpatch::{patch_config_file, FieldUpdates};
use std::path::Path;

/// Patch account credentials into camfleet module config files
#[derive(FromArgs, Debug)]
struct PatchArgs {
    /// new userName value (empty = leave unchanged)
    #[argh(positional)]
    username: String,

    /// new accessCode value (empty = leave unchanged)
    #[argh(positional)]
    access_code: String,

    /// new auth_ip server value (empty = leave unchanged)
    #[argh(positional)]
    server: String,

    /// config files to patch
    #[argh(positional)]
    config_files: Vec<String>,

    /// skip the timestamped backup copy
    #[argh(switch)]
    skip_backup: bool,
}

fn main() {
    let args: PatchArgs = argh::from_env();

    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    if args.config_files.is_empty() {
        log::error!("No config files given");
        std::process::exit(1);
    }

    let updates = FieldUpdates {
        username: args.username,
        access_code: args.access_code,
        server: args.server,
    };

    let mut all_ok = true;
    for file in &args.config_files {
        match patch_config_file(Path::new(file), &updates, !args.skip_backup) {
            Ok(outcome) => {
                if outcome.updated.is_empty() {
                    log::warn!("No fields updated in {file}");
                }
            }
            Err(e) => {
                log::error!("{e}");
                all_ok = false;
            }
        }
    }

    if all_ok {
        log::info!("All config files processed");
    } else {
        log::error!("Some config files failed to process");
        std::process::exit(1);
    }
}
