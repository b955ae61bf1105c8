//! Log-file helpers.
//!
//! The subscriber itself is installed by the binary; libraries only
//! emit `tracing` events.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::PlatformPaths;

pub const LOG_FILE_NAME: &str = "fastdbg.log";

/// Size at which the current log is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated logs kept next to the current one.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// `<log_dir>/fastdbg.log`.
pub fn default_log_file_path(paths: &dyn PlatformPaths) -> PathBuf {
    paths.log_dir().join(LOG_FILE_NAME)
}

/// Create the parent directory of `log_path` if needed.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Shift `log`, `log.1`, ... up by one once `log` reaches `max_size`,
/// dropping whatever would become `log.<max_files + 1>`.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < max_size || max_files == 0 {
        return Ok(());
    }

    let oldest = numbered(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..max_files).rev() {
        let from = numbered(log_path, index);
        if from.exists() {
            fs::rename(&from, numbered(log_path, index + 1))?;
        }
    }
    fs::rename(log_path, numbered(log_path, 1))
}

/// Map a configured level name onto an `EnvFilter` directive.
/// Unknown names fall back to `info`.
pub fn log_level_to_filter(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        "off" => "off",
        _ => "info",
    }
}

fn numbered(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
