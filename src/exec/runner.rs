//! Command Runner
//!
//! Runs one external command with a timeout and turns every outcome into a
//! [`CommandResult`]. Nothing here returns `Err`: a missing binary, a hung
//! device or garbage bytes on stdout all become text the caller can match on.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Prefix of every sentinel string
pub const ERROR_PREFIX: &str = "ERROR:";

/// Text returned when a command exceeds its timeout
pub const TIMEOUT_MESSAGE: &str = "ERROR: Timeout running command";

/// How a command invocation went wrong, if it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    None,
    Timeout,
    /// The command succeeded but invalid UTF-8 was dropped from its output
    DecodeIssue,
    /// Spawn failure, I/O failure or non-zero exit
    ProcessFailure,
}

/// Outcome of a single command invocation
///
/// `raw_output` is the text callers inspect: stdout on success, otherwise
/// stderr or a sentinel beginning with `ERROR:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub raw_output: String,
    pub succeeded: bool,
    pub error_kind: ErrorKind,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn timeout(message: &str) -> Self {
        Self {
            raw_output: message.to_string(),
            succeeded: false,
            error_kind: ErrorKind::Timeout,
            exit_code: None,
        }
    }

    pub fn failure(description: impl std::fmt::Display) -> Self {
        Self {
            raw_output: format!("{} {}", ERROR_PREFIX, description),
            succeeded: false,
            error_kind: ErrorKind::ProcessFailure,
            exit_code: None,
        }
    }

    /// Output text, including any sentinel
    pub fn text(&self) -> &str {
        &self.raw_output
    }

    /// Whether the output is a sentinel rather than command output
    pub fn is_sentinel(&self) -> bool {
        self.raw_output.starts_with(ERROR_PREFIX)
    }
}

/// Raw result of running a process to completion (or not)
#[derive(Debug)]
pub(crate) enum Capture {
    Completed {
        exit_code: Option<i32>,
        success: bool,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    TimedOut,
    Failed(String),
}

/// Decode bytes as UTF-8, dropping invalid sequences
///
/// Returns the text and whether anything was dropped.
pub fn decode_permissive(bytes: &[u8]) -> (String, bool) {
    let mut text = String::with_capacity(bytes.len());
    let mut lossy = false;
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
        if !chunk.invalid().is_empty() {
            lossy = true;
        }
    }
    (text, lossy)
}

async fn read_to_end<R: AsyncRead + Unpin>(mut reader: R) -> Vec<u8> {
    let mut buffer = Vec::new();
    let _ = reader.read_to_end(&mut buffer).await;
    buffer
}

/// Kill the child and everything in its process group, then reap it
///
/// `pid` is taken at spawn time: once the child has been reaped `Child::id`
/// returns `None`, but its group may still hold background processes.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // The child leads its own group, so this also reaches `sh -c` grandchildren
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
    let _ = child.kill().await;
}

/// Spawn `program args...` and collect its output within `timeout`
///
/// The deadline covers both the exit and the end of output: a background
/// process holding the pipes open counts against it.
pub(crate) async fn capture<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    timeout: Duration,
) -> Capture {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return Capture::Failed(format!("Failed to spawn '{}': {}", program.display(), e)),
    };
    let pid = child.id();

    // Drain both pipes concurrently; a chatty process would otherwise block on a
    // full pipe buffer and look like a timeout.
    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => (out, err),
        _ => {
            terminate(&mut child, pid).await;
            return Capture::Failed("Failed to capture process output".to_string());
        }
    };
    let mut stdout_task = tokio::spawn(read_to_end(stdout));
    let mut stderr_task = tokio::spawn(read_to_end(stderr));

    let collected = tokio::time::timeout(timeout, async {
        let status = child.wait().await?;
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, stdout, stderr))
    })
    .await;

    match collected {
        Ok(Ok((status, stdout, stderr))) => Capture::Completed {
            exit_code: status.code(),
            success: status.success(),
            stdout,
            stderr,
        },
        Ok(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            Capture::Failed(format!("Failed to wait for process: {}", e))
        }
        Err(_) => {
            terminate(&mut child, pid).await;
            stdout_task.abort();
            stderr_task.abort();
            Capture::TimedOut
        }
    }
}

/// Runs host and debug-bridge commands
///
/// Commands are argument vectors. Nothing is interpolated into a shell
/// unless [`CommandRunner::run_shell_line`] is called explicitly.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    bridge: PathBuf,
    bridge_args: Vec<String>,
    command_timeout: Duration,
    dumpsys_timeout: Duration,
}

impl CommandRunner {
    pub fn new(bridge: impl Into<PathBuf>) -> Self {
        Self {
            bridge: bridge.into(),
            bridge_args: Vec::new(),
            command_timeout: Duration::from_secs(30),
            dumpsys_timeout: Duration::from_secs(60),
        }
    }

    /// Arguments placed before every bridge command (e.g. `-s <serial>`)
    pub fn with_bridge_args(mut self, args: Vec<String>) -> Self {
        self.bridge_args = args;
        self
    }

    pub fn with_timeouts(mut self, command: Duration, dumpsys: Duration) -> Self {
        self.command_timeout = command;
        self.dumpsys_timeout = dumpsys;
        self
    }

    pub fn bridge(&self) -> &Path {
        &self.bridge
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn dumpsys_timeout(&self) -> Duration {
        self.dumpsys_timeout
    }

    /// Run `argv[0] argv[1..]` on the host
    pub async fn run(&self, argv: &[String], timeout: Duration) -> CommandResult {
        let Some((program, args)) = argv.split_first() else {
            return CommandResult::failure("Empty command");
        };
        run_program(Path::new(program), args, timeout).await
    }

    /// Run the debug bridge with `args` (bridge args are prepended)
    pub async fn bridge_command(&self, args: &[String], timeout: Duration) -> CommandResult {
        run_program(&self.bridge, &self.bridge_argv(args), timeout).await
    }

    /// Run a command line through `sh -c`
    ///
    /// The line is passed to the shell verbatim; quoting is the caller's job.
    pub async fn run_shell_line(&self, line: &str, timeout: Duration) -> CommandResult {
        let argv = vec!["sh".to_string(), "-c".to_string(), line.to_string()];
        self.run(&argv, timeout).await
    }

    pub(crate) fn bridge_argv(&self, args: &[String]) -> Vec<String> {
        let mut full = self.bridge_args.clone();
        full.extend(args.iter().cloned());
        full
    }
}

fn display_command<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

async fn run_program(program: &Path, args: &[String], timeout: Duration) -> CommandResult {
    tracing::info!("Running command: {}", display_command(program, args));

    let result = match capture(program, args, timeout).await {
        Capture::Completed {
            exit_code,
            success,
            stdout,
            stderr,
        } => {
            let (raw_output, lossy) = if success {
                decode_permissive(&stdout)
            } else {
                decode_permissive(&stderr)
            };
            let error_kind = match (success, lossy) {
                (false, _) => ErrorKind::ProcessFailure,
                (true, true) => ErrorKind::DecodeIssue,
                (true, false) => ErrorKind::None,
            };
            CommandResult {
                raw_output,
                succeeded: success,
                error_kind,
                exit_code,
            }
        }
        Capture::TimedOut => CommandResult::timeout(TIMEOUT_MESSAGE),
        Capture::Failed(description) => CommandResult::failure(description),
    };

    tracing::info!("Result: '{}'", result.raw_output.trim());
    result
}
