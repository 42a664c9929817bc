//! Credential patcher for camfleet module config files
//!
//! Rewrites the `"userName"`, `"accessCode"` and `"auth_ip"` text fields of
//! a JSON-like config file in place, without parsing it as JSON: module
//! configs carry comments and field ordering the modules are sensitive to,
//! so only the matching `"key": "value"` spans are touched.
//!
//! The whole operation runs behind an exclusive `flock` and lands via
//! write-temp-then-atomic-rename. An empty input value means "do not modify
//! this field". Fields not present in the file are left unchanged and
//! reported as warnings.

use regex::{NoExpand, Regex};
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;

use nix::fcntl::{Flock, FlockArg};
use nix::sys::statvfs::statvfs;

/// Refuse to rewrite a config when the filesystem has less than this free.
const MIN_FREE_BYTES: u64 = 1024 * 1024;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""userName"\s*:\s*"[^"]*""#).unwrap());
static ACCESS_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""accessCode"\s*:\s*"[^"]*""#).unwrap());
static AUTH_IP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""auth_ip"\s*:\s*"[^"]*""#).unwrap());

/// New field values. An empty string leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct FieldUpdates {
    pub username: String,
    pub access_code: String,
    pub server: String,
}

/// What happened to one config file.
#[derive(Debug, Default)]
pub struct PatchOutcome {
    /// Fields rewritten
    pub updated: Vec<&'static str>,
    /// Requested fields the file does not contain
    pub missing: Vec<&'static str>,
    /// Backup copy, when one was made
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Failed to open config file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock config file '{path}': {errno}")]
    Lock {
        path: String,
        errno: nix::errno::Errno,
    },

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Insufficient disk space to rewrite '{path}'")]
    DiskSpace { path: String },

    #[error("Failed to write patched config for '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Patch one config file in place.
///
/// Acquires an exclusive lock on the target, applies every non-empty field
/// update, then atomically replaces the file. With `backup` set, a
/// timestamped `.bak` copy is made first; backup failure is a warning, not
/// an error.
pub fn patch_config_file(
    path: &Path,
    updates: &FieldUpdates,
    backup: bool,
) -> Result<PatchOutcome, PatchError> {
    let display = path.display().to_string();

    check_disk_space(path)?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| PatchError::Open {
            path: display.clone(),
            source,
        })?;

    // Exclusive advisory lock for the whole read-modify-replace cycle.
    let lock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| PatchError::Lock {
        path: display.clone(),
        errno,
    })?;

    let mut content = String::new();
    (&*lock)
        .read_to_string(&mut content)
        .map_err(|source| PatchError::Read {
            path: display.clone(),
            source,
        })?;

    let mut outcome = PatchOutcome::default();
    if backup {
        outcome.backup_path = create_backup(path);
    }

    let fields: [(&'static str, &Regex, &str); 3] = [
        ("userName", &USERNAME_PATTERN, &updates.username),
        ("accessCode", &ACCESS_CODE_PATTERN, &updates.access_code),
        ("auth_ip", &AUTH_IP_PATTERN, &updates.server),
    ];

    for (key, pattern, value) in fields {
        if value.is_empty() {
            continue;
        }
        if !pattern.is_match(&content) {
            log::warn!("Field '{key}' not found in {display}, leaving it unchanged");
            outcome.missing.push(key);
            continue;
        }
        let replacement = format!(r#""{key}": "{value}""#);
        content = pattern
            .replace_all(&content, NoExpand(&replacement))
            .into_owned();
        log::info!("Updated '{key}' in {display}");
        outcome.updated.push(key);
    }

    write_atomically(path, &content).map_err(|source| PatchError::Write {
        path: display.clone(),
        source,
    })?;

    drop(lock);
    log::info!("Config file updated: {display}");
    Ok(outcome)
}

/// Write to a temp file in the target's directory, then rename over it so
/// readers only ever see the old or the new content.
fn write_atomically(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy the file aside as `<path>.bak.<unix-timestamp>`. Best-effort.
fn create_backup(path: &Path) -> Option<PathBuf> {
    let backup_path = PathBuf::from(format!(
        "{}.bak.{}",
        path.display(),
        chrono::Utc::now().timestamp()
    ));
    match fs::copy(path, &backup_path) {
        Ok(_) => {
            log::info!("Backup created: {}", backup_path.display());
            Some(backup_path)
        }
        Err(e) => {
            log::warn!("Failed to create backup for {}: {e}", path.display());
            None
        }
    }
}

/// Require at least [`MIN_FREE_BYTES`] available in the target filesystem.
/// A failed check itself is a warning, not an error.
fn check_disk_space(path: &Path) -> Result<(), PatchError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    match statvfs(dir) {
        Ok(stat) => {
            let available = stat.blocks_available() as u64 * stat.fragment_size() as u64;
            if available < MIN_FREE_BYTES {
                return Err(PatchError::DiskSpace {
                    path: path.display().to_string(),
                });
            }
            Ok(())
        }
        Err(e) => {
            log::warn!("Failed to check disk space for {}: {e}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
    "version": 3,
    "userName": "a",
    "accessCode": "b",
    "auth_ip": "10.0.0.1"
}"#;

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join("module.config.json");
        fs::write(&path, SAMPLE).expect("write sample config");
        path
    }

    fn updates(user: &str, code: &str, server: &str) -> FieldUpdates {
        FieldUpdates {
            username: user.to_string(),
            access_code: code.to_string(),
            server: server.to_string(),
        }
    }

    #[test]
    fn test_empty_values_leave_fields_untouched() {
        let dir = tempdir().expect("tempdir");
        let path = write_sample(dir.path());

        let outcome =
            patch_config_file(&path, &updates("x", "", ""), false).expect("patch should succeed");

        let content = fs::read_to_string(&path).expect("read patched config");
        assert!(content.contains(r#""userName": "x""#));
        assert!(content.contains(r#""accessCode": "b""#));
        assert!(content.contains(r#""auth_ip": "10.0.0.1""#));
        assert_eq!(outcome.updated, vec!["userName"]);
        assert!(outcome.missing.is_empty());
    }

    #[test]
    fn test_all_fields_updated() {
        let dir = tempdir().expect("tempdir");
        let path = write_sample(dir.path());

        let outcome = patch_config_file(&path, &updates("u", "c", "192.168.1.9"), false)
            .expect("patch should succeed");

        let content = fs::read_to_string(&path).expect("read patched config");
        assert!(content.contains(r#""userName": "u""#));
        assert!(content.contains(r#""accessCode": "c""#));
        assert!(content.contains(r#""auth_ip": "192.168.1.9""#));
        assert_eq!(outcome.updated, vec!["userName", "accessCode", "auth_ip"]);
    }

    #[test]
    fn test_loose_whitespace_around_colon() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("loose.json");
        fs::write(&path, r#"{ "userName" :   "old" }"#).expect("write sample");

        patch_config_file(&path, &updates("new", "", ""), false).expect("patch should succeed");

        let content = fs::read_to_string(&path).expect("read patched config");
        assert!(content.contains(r#""userName": "new""#));
    }

    #[test]
    fn test_missing_field_reported_and_rest_patched() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "userName": "a" }"#).expect("write sample");

        let outcome = patch_config_file(&path, &updates("x", "y", ""), false)
            .expect("patch should succeed");

        assert_eq!(outcome.updated, vec!["userName"]);
        assert_eq!(outcome.missing, vec!["accessCode"]);
        let content = fs::read_to_string(&path).expect("read patched config");
        assert!(content.contains(r#""userName": "x""#));
    }

    #[test]
    fn test_dollar_signs_in_values_are_literal() {
        let dir = tempdir().expect("tempdir");
        let path = write_sample(dir.path());

        patch_config_file(&path, &updates("us$1er", "", ""), false)
            .expect("patch should succeed");

        let content = fs::read_to_string(&path).expect("read patched config");
        assert!(content.contains(r#""userName": "us$1er""#));
    }

    #[test]
    fn test_backup_created_on_request() {
        let dir = tempdir().expect("tempdir");
        let path = write_sample(dir.path());

        let outcome =
            patch_config_file(&path, &updates("x", "", ""), true).expect("patch should succeed");

        let backup = outcome.backup_path.expect("backup should exist");
        assert_eq!(
            fs::read_to_string(backup).expect("read backup"),
            SAMPLE,
            "backup must hold the pre-patch content"
        );
    }

    #[test]
    fn test_no_backup_by_default() {
        let dir = tempdir().expect("tempdir");
        let path = write_sample(dir.path());

        let outcome =
            patch_config_file(&path, &updates("x", "", ""), false).expect("patch should succeed");
        assert!(outcome.backup_path.is_none());

        let entries = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        let result = patch_config_file(&path, &updates("x", "", ""), false);
        assert!(matches!(result, Err(PatchError::Open { .. })));
    }
}
