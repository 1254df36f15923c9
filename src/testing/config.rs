//! Test suite configuration types
//!
//! Defines the data structures for deserializing YAML test suites.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};
use crate::session::{Locator, Orientation};

use super::expect::Expectation;

/// A suite of test cases loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestSuite {
    /// Name of the suite
    pub name: String,
    /// Optional description of what the suite covers
    pub description: Option<String>,
    /// Whether to open an automation session for the suite
    #[serde(default = "default_true")]
    pub session: bool,
    /// Variables available as `${name}` in every test
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    /// Test cases, run in order
    pub tests: Vec<TestCase>,
}

fn default_true() -> bool {
    true
}

/// One test case: a linear sequence of steps
#[derive(Deserialize, Debug)]
pub struct TestCase {
    /// Test name, used for report files and the summary table
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<TestStep>,
}

/// A step plus what to do with its output
#[derive(Deserialize, Debug)]
pub struct TestStep {
    #[serde(flatten)]
    pub action: Action,
    /// Store the step output as a variable
    pub save_as: Option<String>,
    /// Write the per-test text report from this step's output
    #[serde(default)]
    pub report: bool,
    /// Attach this step's output to the HTML summary under this section name
    pub detail: Option<String>,
    /// Checks applied to the output
    pub expect: Option<Expectation>,
    /// Re-run the step while it fails
    pub retry: Option<RetryPolicy>,
    /// Command timeout override
    pub timeout_secs: Option<u64>,
    /// Fixed pause after the step, letting the app settle
    pub settle_ms: Option<u64>,
}

/// Fixed-count retry with a constant delay
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

/// What a step does
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Run the debug bridge with these arguments (e.g. `[shell, am, broadcast, ...]`)
    Shell { args: Vec<String> },
    /// Run an arbitrary host program
    Host { argv: Vec<String> },
    /// Run a command line through `sh -c`; quoting is up to the suite author
    ShellLine { line: String },
    /// `<bridge> shell dumpsys <service>`
    Dumpsys { service: String },
    /// Fixed sleep
    Sleep { ms: u64 },
    /// Clear the device log
    LogcatClear,
    /// Extract the device log around the first error line
    LogcatContext,
    /// Count matching elements (output is the count)
    Find { locator: Locator },
    Click { locator: Locator },
    /// Output is the element text, trimmed
    Text { locator: Locator },
    /// Output is `true` or `false`
    Displayed { locator: Locator },
    Back,
    /// Optionally rotate, then output the current orientation
    Orientation { set: Option<Orientation> },
    /// Send the app to the background for a number of seconds
    Background { seconds: u64 },
    /// Bring an app to the foreground (defaults to the package under test)
    ActivateApp { app_id: Option<String> },
    TerminateApp { app_id: Option<String> },
    /// Press an Android key code (3 = HOME, 4 = BACK, 82 = MENU)
    PressKeycode { keycode: i64 },
    OpenNotifications,
    /// Output is the session-side log, one message per line
    SessionLog {
        #[serde(default = "default_log_type")]
        log_type: String,
    },
    /// Run a device shell command through the automation endpoint
    MobileShell {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Attach a templated value (usually saved variables) as a detail section
    Attach { section: String, value: String },
}

impl Action {
    /// Whether the step needs an automation session
    pub fn needs_session(&self) -> bool {
        matches!(
            self,
            Action::Find { .. }
                | Action::Click { .. }
                | Action::Text { .. }
                | Action::Displayed { .. }
                | Action::Back
                | Action::Orientation { .. }
                | Action::Background { .. }
                | Action::ActivateApp { .. }
                | Action::TerminateApp { .. }
                | Action::PressKeycode { .. }
                | Action::OpenNotifications
                | Action::SessionLog { .. }
                | Action::MobileShell { .. }
        )
    }
}

fn default_log_type() -> String {
    "logcat".to_string()
}

/// Load and validate a suite file
pub fn load_suite(path: &Path) -> Result<TestSuite> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test suite '{}': {}",
            path.display(),
            e
        ))
    })?;

    let suite = parse_suite(&content).map_err(|e| Error::suite(path, e.to_string()))?;
    validate(&suite).map_err(|message| Error::suite(path, message))?;
    Ok(suite)
}

fn parse_suite(content: &str) -> std::result::Result<TestSuite, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

fn validate(suite: &TestSuite) -> std::result::Result<(), String> {
    if suite.tests.is_empty() {
        return Err("suite has no tests".to_string());
    }

    for test in &suite.tests {
        if test.name.trim().is_empty() {
            return Err("test with empty name".to_string());
        }
        if test.name.contains(['/', '\\']) {
            return Err(format!("test name '{}' must not contain path separators", test.name));
        }
        for (i, step) in test.steps.iter().enumerate() {
            if step.action.needs_session() && !suite.session {
                return Err(format!(
                    "test '{}' step {} needs a UI session but the suite sets 'session: false'",
                    test.name,
                    i + 1
                ));
            }
            if let Some(retry) = step.retry {
                if retry.attempts == 0 {
                    return Err(format!(
                        "test '{}' step {}: retry attempts must be at least 1",
                        test.name,
                        i + 1
                    ));
                }
            }
            match &step.action {
                Action::Shell { args } if args.is_empty() => {
                    return Err(format!("test '{}' step {}: empty shell args", test.name, i + 1))
                }
                Action::Host { argv } if argv.is_empty() => {
                    return Err(format!("test '{}' step {}: empty host argv", test.name, i + 1))
                }
                _ => {}
            }
        }
    }

    Ok(())
}
