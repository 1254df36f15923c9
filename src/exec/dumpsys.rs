//! Dumpsys Runner
//!
//! Diagnostic dumps can run long and produce megabytes of output, so the
//! pipes are read as raw bytes and decoded once the process exits.

use std::time::Duration;

use super::runner::{capture, decode_permissive, Capture, CommandResult, ErrorKind, ERROR_PREFIX};
use super::CommandRunner;

/// Text returned when a dump exceeds its timeout
pub const DUMPSYS_TIMEOUT_MESSAGE: &str = "ERROR: Timeout running dumpsys command";

impl CommandRunner {
    /// Run `<bridge> shell dumpsys <suffix>`
    ///
    /// `suffix` is split on whitespace (`"activity broadcasts"` becomes two
    /// arguments). A non-zero exit yields `ERROR: <stderr>`; a timeout kills
    /// the dump before returning.
    pub async fn run_dump(&self, suffix: &str, timeout: Duration) -> CommandResult {
        let mut args = vec!["shell".to_string(), "dumpsys".to_string()];
        args.extend(suffix.split_whitespace().map(str::to_string));
        let args = self.bridge_argv(&args);

        tracing::info!(
            "Running dumpsys command: {} {}",
            self.bridge().display(),
            args.join(" ")
        );

        match capture(self.bridge(), &args, timeout).await {
            Capture::Completed {
                exit_code,
                success,
                stdout,
                stderr,
            } => {
                if !success {
                    let (error_output, _) = decode_permissive(&stderr);
                    tracing::warn!("dumpsys {} failed with exit code {:?}", suffix, exit_code);
                    return CommandResult {
                        raw_output: format!("{} {}", ERROR_PREFIX, error_output),
                        succeeded: false,
                        error_kind: ErrorKind::ProcessFailure,
                        exit_code,
                    };
                }

                let (output, lossy) = decode_permissive(&stdout);
                tracing::info!(
                    "Dumpsys command completed, output length: {} characters",
                    output.chars().count()
                );
                CommandResult {
                    raw_output: output,
                    succeeded: true,
                    error_kind: if lossy {
                        ErrorKind::DecodeIssue
                    } else {
                        ErrorKind::None
                    },
                    exit_code,
                }
            }
            Capture::TimedOut => {
                tracing::warn!("dumpsys {} timed out after {:?}", suffix, timeout);
                CommandResult::timeout(DUMPSYS_TIMEOUT_MESSAGE)
            }
            Capture::Failed(description) => CommandResult::failure(description),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exec::test_support::fake_bridge;

    #[tokio::test]
    async fn test_dump_builds_bridge_argv() {
        let dir = tempfile::tempdir().unwrap();
        let runner = fake_bridge(dir.path(), r#"echo "$@""#);

        let result = runner
            .run_dump("activity  broadcasts", Duration::from_secs(10))
            .await;

        assert_eq!(result.text(), "shell dumpsys activity broadcasts\n");
        assert!(result.succeeded);
        assert_eq!(result.error_kind, ErrorKind::None);
    }

    #[tokio::test]
    async fn test_dump_nonzero_exit_prefixes_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = fake_bridge(dir.path(), "echo partial; echo 'Can not find service' >&2; exit 1");

        let result = runner.run_dump("nosuchservice", Duration::from_secs(10)).await;

        assert_eq!(result.text(), "ERROR: Can not find service\n");
        assert!(!result.succeeded);
        assert_eq!(result.error_kind, ErrorKind::ProcessFailure);
        assert_eq!(result.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_dump_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("dump.pid");
        let runner = fake_bridge(
            dir.path(),
            &format!("echo $$ > {}; exec sleep 30", pid_file.display()),
        );

        let result = runner.run_dump("meminfo", Duration::from_millis(500)).await;

        assert_eq!(result.text(), DUMPSYS_TIMEOUT_MESSAGE);
        assert_eq!(result.error_kind, ErrorKind::Timeout);

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_ne!(unsafe { libc::kill(pid, 0) }, 0, "dump process still running");
    }

    #[tokio::test]
    async fn test_dump_timeout_covers_background_holding_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = fake_bridge(dir.path(), "sleep 8 & echo 'DUMP OF SERVICE battery:'");

        let start = std::time::Instant::now();
        let result = runner.run_dump("battery", Duration::from_secs(1)).await;

        assert!(start.elapsed() < Duration::from_secs(4), "took {:?}", start.elapsed());
        assert_eq!(result.text(), DUMPSYS_TIMEOUT_MESSAGE);
        assert_eq!(result.error_kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_dump_missing_bridge_is_sentinel() {
        let runner = CommandRunner::new("/nonexistent/adb");
        let result = runner.run_dump("battery", Duration::from_secs(5)).await;
        assert!(result.text().starts_with("ERROR: "));
        assert_eq!(result.error_kind, ErrorKind::ProcessFailure);
    }
}
