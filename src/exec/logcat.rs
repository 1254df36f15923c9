//! Logcat error context
//!
//! When a test fails, the device log around the first error-looking line is
//! usually the fastest way to see what the app did.

use super::CommandRunner;

/// Placeholder returned when no line matches
pub const NO_CONTEXT_MESSAGE: &str = "(no relevant error line found)";

/// Find the first line containing any keyword (case-insensitive) and return
/// it with `context_lines` lines on each side
pub fn find_error_context(output: &str, keywords: &[String], context_lines: usize) -> Option<String> {
    let lines: Vec<&str> = output.lines().collect();
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let idx = lines.iter().position(|line| {
        let line = line.to_lowercase();
        lowered.iter().any(|k| line.contains(k.as_str()))
    })?;

    let start = idx.saturating_sub(context_lines);
    let end = (idx + context_lines + 1).min(lines.len());
    Some(lines[start..end].join("\n"))
}

impl CommandRunner {
    /// Dump the device log (`logcat -d`) and extract the error context
    pub async fn logcat_error_context(&self, keywords: &[String], context_lines: usize) -> String {
        let args = vec!["logcat".to_string(), "-d".to_string()];
        let result = self.bridge_command(&args, self.command_timeout()).await;
        find_error_context(result.text(), keywords, context_lines)
            .unwrap_or_else(|| NO_CONTEXT_MESSAGE.to_string())
    }

    /// Clear the device log buffer (`logcat -c`)
    pub async fn clear_logcat(&self) {
        let args = vec!["logcat".to_string(), "-c".to_string()];
        let _ = self.bridge_command(&args, self.command_timeout()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::default_error_keywords;

    fn numbered(n: usize, marker_at: usize, marker: &str) -> String {
        (0..n)
            .map(|i| {
                if i == marker_at {
                    format!("line {i} {marker}")
                } else {
                    format!("line {i}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_context_window_around_first_match() {
        let log = numbered(20, 10, "FATAL EXCEPTION: main");
        let context = find_error_context(&log, &default_error_keywords(), 5).unwrap();
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "line 5");
        assert_eq!(lines[5], "line 10 FATAL EXCEPTION: main");
        assert_eq!(lines[10], "line 15");
    }

    #[test]
    fn test_context_clamped_at_edges() {
        let log = numbered(4, 1, "app crash");
        let context = find_error_context(&log, &default_error_keywords(), 5).unwrap();
        assert_eq!(context, "line 0\nline 1 app crash\nline 2\nline 3");
    }

    #[test]
    fn test_only_first_match_is_used() {
        let log = "ok\nError one\nok\nerror two";
        let context = find_error_context(log, &default_error_keywords(), 0).unwrap();
        assert_eq!(context, "Error one");
    }

    #[test]
    fn test_no_match() {
        assert!(find_error_context("all\ngood", &default_error_keywords(), 5).is_none());
        assert!(find_error_context("", &default_error_keywords(), 5).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_logcat_error_context_via_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let runner = crate::exec::test_support::fake_bridge(
            dir.path(),
            r#"if [ "$1" = "logcat" ] && [ "$2" = "-d" ]; then printf 'boot\nE/AndroidRuntime: FATAL EXCEPTION\nbye\n'; fi"#,
        );
        let context = runner.logcat_error_context(&default_error_keywords(), 1).await;
        assert_eq!(context, "boot\nE/AndroidRuntime: FATAL EXCEPTION\nbye");
    }
}
