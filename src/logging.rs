//! Logging configuration for the `dune` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary, which logs to stderr or to a file under the platform state dir.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_FILE_ENV: &str = "DUNE_LOG_FILE";
const LOG_DIR: &str = "dune-client";
const LOG_FILE: &str = "dune.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to stderr.
///
/// Results go to stdout, so progress events never mix with piped output.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to `path`, or to [`get_log_path`] when `None`.
///
/// Falls back to stderr if the file cannot be opened.
pub fn init_file_logging(path: Option<&Path>) {
    let log_path = path.map(Path::to_path_buf).unwrap_or_else(get_log_path);

    match open_log_file(&log_path) {
        Ok(log_file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(log_file)
            .with_ansi(false)
            .init(),
        Err(e) => {
            eprintln!("Warning: Could not open log file {}: {e}", log_path.display());
            init_stderr_logging();
        }
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    // Successive `dune` invocations share one file.
    OpenOptions::new().create(true).append(true).open(path)
}

/// Returns the default log file path.
///
/// `DUNE_LOG_FILE` wins when set; otherwise `dune-client/dune.log` under the
/// platform state dir, the config dir, or the temp dir, whichever exists first.
pub fn get_log_path() -> PathBuf {
    log_path_from(std::env::var_os(LOG_FILE_ENV))
}

fn log_path_from(override_path: Option<OsString>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join(LOG_DIR).join(LOG_FILE))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE))
}
