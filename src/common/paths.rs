//! Configuration and output paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/droidcheck/`
//! - macOS: `~/Library/Application Support/droidcheck/`
//! - Windows: `%APPDATA%\droidcheck\`

use std::io;
use std::path::{Path, PathBuf};

/// Application name used for config directories
const APP_NAME: &str = "droidcheck";

/// File name of the HTML summary written at the end of every run
pub const SUMMARY_FILE_NAME: &str = "receiver_test_summary.html";

/// File name of the per-run log written next to the reports
pub const RUN_LOG_FILE_NAME: &str = "run.log";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "DROIDCHECK_CONFIG";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
///
/// `DROIDCHECK_CONFIG` wins over the platform location.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Ensure a reports directory exists, creating parents as needed
pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}
