//! Per-test plain-text reports

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::common::paths::ensure_dir;
use crate::common::Result;

/// Appended when the report body is empty
pub const EMPTY_BODY_NOTE: &str = "(command returned no output)";

const SEPARATOR_WIDTH: usize = 50;

/// Write `<test_name>_<YYYYmmdd_HHMMSS>.txt` into `dir`
///
/// The file starts with the test name, the timestamp and a separator line.
pub fn save_report(dir: &Path, test_name: &str, content: &str) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    save_report_at(dir, test_name, content, &timestamp)
}

pub(crate) fn save_report_at(
    dir: &Path,
    test_name: &str,
    content: &str,
    timestamp: &str,
) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(format!("{}_{}.txt", test_name, timestamp));

    let mut body = String::with_capacity(content.len() + 128);
    body.push_str(&format!("Test: {}\n", test_name));
    body.push_str(&format!("Timestamp: {}\n", timestamp));
    body.push_str(&"=".repeat(SEPARATOR_WIDTH));
    body.push('\n');
    body.push_str(content);
    if content.trim().is_empty() {
        body.push_str(EMPTY_BODY_NOTE);
    }

    std::fs::write(&path, body)?;
    tracing::debug!("Saved report {}", path.display());
    Ok(path)
}
