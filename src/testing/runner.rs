//! Test runner implementation
//!
//! Runs each test case of a suite once, in order. A failing step ends its
//! test; the failure is recorded with the surrounding device log and the run
//! moves on to the next test.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use serde_json::{json, Value};

use crate::common::config::default_error_keywords;
use crate::common::{expand_vars, Error, Result};
use crate::exec::CommandRunner;
use crate::report::{save_report, ReportAggregator, Status, TestRecord};
use crate::session::{Locator, UiDriver};

use super::config::{Action, RetryPolicy, TestCase, TestStep, TestSuite};

/// Variable holding the package under test
pub const APP_PACKAGE_VAR: &str = "app_package";

/// Section name used for the failure message in the HTML summary
pub const ERROR_SECTION: &str = "error";

const DEFAULT_CONTEXT_LINES: usize = 5;

/// Counts for one suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteResult {
    pub name: String,
    pub passed: usize,
    pub failed: usize,
}

/// Per-test mutable state
struct TestState {
    vars: HashMap<String, String>,
    last_report: Option<PathBuf>,
}

/// Executes suites against a device bridge and an optional UI session
pub struct SuiteRunner {
    commands: CommandRunner,
    driver: Option<Box<dyn UiDriver>>,
    app_package: String,
    reports_dir: PathBuf,
    error_keywords: Vec<String>,
    context_lines: usize,
    verbose: bool,
}

impl SuiteRunner {
    pub fn new(commands: CommandRunner, app_package: impl Into<String>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            driver: None,
            app_package: app_package.into(),
            reports_dir: reports_dir.into(),
            error_keywords: default_error_keywords(),
            context_lines: DEFAULT_CONTEXT_LINES,
            verbose: false,
        }
    }

    pub fn with_driver(mut self, driver: Box<dyn UiDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_log_context(mut self, keywords: Vec<String>, context_lines: usize) -> Self {
        self.error_keywords = keywords;
        self.context_lines = context_lines;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// End the UI session, if any
    pub async fn shutdown(self) {
        if let Some(driver) = self.driver {
            if let Err(e) = driver.quit().await {
                tracing::warn!("Failed to end automation session: {}", e);
            }
        }
    }

    /// Run every test in `suite`, recording each outcome in `report`
    pub async fn run_suite(&self, suite: &TestSuite, report: &mut ReportAggregator) -> SuiteResult {
        println!("\n{} {}", "Suite:".cyan().bold(), suite.name.white().bold());
        if let Some(desc) = &suite.description {
            println!("  {}", desc.dimmed());
        }
        tracing::info!("Running suite {} ({} tests)", suite.name, suite.tests.len());

        let mut result = SuiteResult {
            name: suite.name.clone(),
            passed: 0,
            failed: 0,
        };

        for test in &suite.tests {
            let record = self.run_test(&suite.vars, test, report).await;
            match record.status {
                Status::Pass => result.passed += 1,
                Status::Fail => result.failed += 1,
            }
            report.record(record);
        }

        result
    }

    /// Run one test and build its record; never fails
    pub async fn run_test(
        &self,
        suite_vars: &BTreeMap<String, String>,
        test: &TestCase,
        report: &mut ReportAggregator,
    ) -> TestRecord {
        println!(
            "\n{} {}",
            "Running Test:".blue().bold(),
            test.name.white().bold()
        );
        if let Some(desc) = &test.description {
            println!("  {}", desc.dimmed());
        }
        tracing::info!("Running test {}", test.name);

        let mut state = TestState {
            vars: HashMap::new(),
            last_report: None,
        };

        let outcome = match self.seed_vars(suite_vars, &mut state) {
            Ok(()) => self.run_steps(test, &mut state, report).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                println!("  {} {}", "✓".green().bold(), "Test Passed".green().bold());
                tracing::info!("Test {} passed", test.name);
                TestRecord::pass(&test.name, "OK", state.last_report)
            }
            Err(e) => {
                let error_msg = match e.assertion_message() {
                    Some(message) => format!("AssertionError: {}", message),
                    None => format!("Exception: {}", e),
                };
                tracing::error!("Test {} failed: {}", test.name, error_msg);

                let context = self
                    .commands
                    .logcat_error_context(&self.error_keywords, self.context_lines)
                    .await;
                let full_error = format!("{}\n\nRelevant log context:\n{}", error_msg, context);

                let log_file = match save_report(&self.reports_dir, &test.name, &full_error) {
                    Ok(path) => Some(path),
                    Err(err) => {
                        tracing::error!("Failed to save error report for {}: {}", test.name, err);
                        state.last_report
                    }
                };
                report.attach_detail(&test.name, ERROR_SECTION, full_error.clone());

                println!("  {} {}", "✗".red().bold(), "Test Failed".red().bold());
                TestRecord::fail(&test.name, full_error, log_file)
            }
        }
    }

    fn seed_vars(&self, suite_vars: &BTreeMap<String, String>, state: &mut TestState) -> Result<()> {
        state
            .vars
            .insert(APP_PACKAGE_VAR.to_string(), self.app_package.clone());
        for (name, value) in suite_vars {
            let value = expand(value, &state.vars)?;
            state.vars.insert(name.clone(), value);
        }
        Ok(())
    }

    async fn run_steps(
        &self,
        test: &TestCase,
        state: &mut TestState,
        report: &mut ReportAggregator,
    ) -> Result<()> {
        for (i, step) in test.steps.iter().enumerate() {
            let step_num = i + 1;
            let desc = describe(&step.action);

            match self.run_step(&test.name, step, state, report).await {
                Ok(output) => {
                    println!("  {} Step {}: {}", "✓".green(), step_num, desc.dimmed());
                    if self.verbose && !output.is_empty() {
                        for line in output.lines() {
                            println!("      {}", line.dimmed());
                        }
                    }
                }
                Err(e) => {
                    println!("  {} Step {}: {}", "✗".red(), step_num, e);
                    return Err(e);
                }
            }

            if let Some(ms) = step.settle_ms {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
        Ok(())
    }

    /// Run a step, re-running it per its retry policy
    async fn run_step(
        &self,
        test_name: &str,
        step: &TestStep,
        state: &mut TestState,
        report: &mut ReportAggregator,
    ) -> Result<String> {
        let policy = step.retry.unwrap_or(RetryPolicy {
            attempts: 1,
            delay_ms: 0,
        });

        let mut attempt = 1;
        loop {
            match self.attempt_step(test_name, step, state, report).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < policy.attempts => {
                    tracing::warn!(
                        "{}: attempt {}/{} failed: {}",
                        test_name,
                        attempt,
                        policy.attempts,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(policy.delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt_step(
        &self,
        test_name: &str,
        step: &TestStep,
        state: &mut TestState,
        report: &mut ReportAggregator,
    ) -> Result<String> {
        let output = self.perform(test_name, step, state, report).await?;

        if let Some(name) = &step.save_as {
            state.vars.insert(name.clone(), output.clone());
        }
        // Written before the expectation so a failing step still leaves its output behind
        if step.report {
            state.last_report = Some(save_report(&self.reports_dir, test_name, &output)?);
        }
        if let Some(section) = &step.detail {
            report.attach_detail(test_name, section, output.clone());
        }
        if let Some(expect) = &step.expect {
            expect.check(&output)?;
        }

        Ok(output)
    }

    /// Execute the action and return its output text
    async fn perform(
        &self,
        test_name: &str,
        step: &TestStep,
        state: &TestState,
        report: &mut ReportAggregator,
    ) -> Result<String> {
        let vars = &state.vars;
        let timeout = step
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.commands.command_timeout());

        let output = match &step.action {
            Action::Shell { args } => {
                let args = expand_all(args, vars)?;
                self.commands.bridge_command(&args, timeout).await.raw_output
            }
            Action::Host { argv } => {
                let argv = expand_all(argv, vars)?;
                self.commands.run(&argv, timeout).await.raw_output
            }
            Action::ShellLine { line } => {
                let line = expand(line, vars)?;
                self.commands.run_shell_line(&line, timeout).await.raw_output
            }
            Action::Dumpsys { service } => {
                let service = expand(service, vars)?;
                let timeout = step
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.commands.dumpsys_timeout());
                self.commands.run_dump(&service, timeout).await.raw_output
            }
            Action::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                String::new()
            }
            Action::LogcatClear => {
                self.commands.clear_logcat().await;
                String::new()
            }
            Action::LogcatContext => {
                self.commands
                    .logcat_error_context(&self.error_keywords, self.context_lines)
                    .await
            }
            Action::Find { locator } => {
                let locator = expand_locator(locator, vars)?;
                self.driver()?.find_elements(&locator).await?.len().to_string()
            }
            Action::Click { locator } => {
                let locator = expand_locator(locator, vars)?;
                let driver = self.driver()?;
                let element = driver.find_element(&locator).await?;
                driver.click(&element).await?;
                String::new()
            }
            Action::Text { locator } => {
                let locator = expand_locator(locator, vars)?;
                let driver = self.driver()?;
                let element = driver.find_element(&locator).await?;
                driver.element_text(&element).await?.trim().to_string()
            }
            Action::Displayed { locator } => {
                let locator = expand_locator(locator, vars)?;
                let driver = self.driver()?;
                let element = driver.find_element(&locator).await?;
                driver.is_displayed(&element).await?.to_string()
            }
            Action::Back => {
                self.driver()?.back().await?;
                String::new()
            }
            Action::Orientation { set } => {
                let driver = self.driver()?;
                if let Some(orientation) = set {
                    driver.set_orientation(*orientation).await?;
                }
                driver.orientation().await?.as_str().to_string()
            }
            Action::Background { seconds } => {
                self.driver()?.background_app(*seconds).await?;
                String::new()
            }
            Action::ActivateApp { app_id } => {
                let app_id = self.app_id(app_id.as_deref(), vars)?;
                self.driver()?.activate_app(&app_id).await?;
                String::new()
            }
            Action::TerminateApp { app_id } => {
                let app_id = self.app_id(app_id.as_deref(), vars)?;
                self.driver()?.terminate_app(&app_id).await?;
                String::new()
            }
            Action::PressKeycode { keycode } => {
                self.driver()?.press_keycode(*keycode).await?;
                String::new()
            }
            Action::OpenNotifications => {
                self.driver()?.open_notifications().await?;
                String::new()
            }
            Action::SessionLog { log_type } => {
                let log_type = expand(log_type, vars)?;
                self.driver()?.log_messages(&log_type).await?.join("\n")
            }
            Action::MobileShell { command, args } => {
                let command = expand(command, vars)?;
                let args = expand_all(args, vars)?;
                let value = self
                    .driver()?
                    .execute_script(
                        "mobile: shell",
                        json!({
                            "command": command,
                            "args": args,
                            "includeStderr": true,
                            "timeout": timeout.as_millis() as u64,
                        }),
                    )
                    .await?;
                script_output(value)
            }
            Action::Attach { section, value } => {
                let value = expand(value, vars)?;
                report.attach_detail(test_name, section, value.clone());
                value
            }
        };

        Ok(output)
    }

    fn driver(&self) -> Result<&dyn UiDriver> {
        self.driver.as_deref().ok_or(Error::SessionNotActive)
    }

    fn app_id(&self, explicit: Option<&str>, vars: &HashMap<String, String>) -> Result<String> {
        match explicit {
            Some(id) => expand(id, vars),
            None => Ok(self.app_package.clone()),
        }
    }
}

fn expand(input: &str, vars: &HashMap<String, String>) -> Result<String> {
    expand_vars(input, |name| vars.get(name).cloned())
}

fn expand_all(inputs: &[String], vars: &HashMap<String, String>) -> Result<Vec<String>> {
    inputs.iter().map(|s| expand(s, vars)).collect()
}

fn expand_locator(locator: &Locator, vars: &HashMap<String, String>) -> Result<Locator> {
    locator.map_value(|v| expand(v, vars))
}

/// `mobile: shell` returns either a plain string or `{stdout, stderr}`
fn script_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Object(map) => {
            let mut out = map
                .get("stdout")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(stderr) = map.get("stderr").and_then(Value::as_str) {
                out.push_str(stderr);
            }
            out
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One-line description for the step list
fn describe(action: &Action) -> String {
    match action {
        Action::Shell { args } => format!("shell {}", args.join(" ")),
        Action::Host { argv } => argv.join(" "),
        Action::ShellLine { line } => format!("sh -c {}", line),
        Action::Dumpsys { service } => format!("dumpsys {}", service),
        Action::Sleep { ms } => format!("sleep {}ms", ms),
        Action::LogcatClear => "logcat clear".to_string(),
        Action::LogcatContext => "logcat context".to_string(),
        Action::Find { locator } => format!("find {}", locator),
        Action::Click { locator } => format!("click {}", locator),
        Action::Text { locator } => format!("text of {}", locator),
        Action::Displayed { locator } => format!("displayed {}", locator),
        Action::Back => "back".to_string(),
        Action::Orientation { set: Some(o) } => format!("orientation -> {}", o.as_str()),
        Action::Orientation { set: None } => "orientation".to_string(),
        Action::Background { seconds } => format!("background {}s", seconds),
        Action::ActivateApp { app_id } => {
            format!("activate {}", app_id.as_deref().unwrap_or("app"))
        }
        Action::TerminateApp { app_id } => {
            format!("terminate {}", app_id.as_deref().unwrap_or("app"))
        }
        Action::PressKeycode { keycode } => format!("press keycode {}", keycode),
        Action::OpenNotifications => "open notifications".to_string(),
        Action::SessionLog { log_type } => format!("{} log", log_type),
        Action::MobileShell { command, args } => {
            format!("mobile shell {} {}", command, args.join(" "))
        }
        Action::Attach { section, .. } => format!("attach {}", section),
    }
}
