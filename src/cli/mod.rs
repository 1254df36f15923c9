//! CLI command handling
//!
//! Dispatches CLI commands to the runners and formats output.

use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;

use crate::capabilities::{resolve_profile, Capabilities};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::exec::{CommandResult, CommandRunner, ErrorKind};
use crate::report::{save_report, ReportAggregator, TestRecord};
use crate::session::WebDriverSession;
use crate::testing::{load_suite, SuiteRunner, TestSuite};

/// Options accepted by every command
#[derive(Debug, Default, Clone)]
pub struct GlobalOptions {
    pub profile: Option<String>,
    pub reports_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

impl GlobalOptions {
    /// Load the config file named by `--config`, or the default one
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }

    pub fn reports_dir(&self, config: &Config) -> PathBuf {
        self.reports_dir
            .clone()
            .unwrap_or_else(|| config.reports.dir.clone())
    }
}

/// Whether the command's own work succeeded; mapped to the exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, global: &GlobalOptions, config: &Config) -> Result<Outcome> {
    match command {
        Commands::Test { suites } => run_tests(&suites, global, config).await,

        Commands::Exec { timeout, json, argv } => {
            // Host commands never touch the bridge, so a missing adb is fine here
            let runner = CommandRunner::new(config.bridge.path.clone().unwrap_or_else(|| PathBuf::from("adb")))
                .with_timeouts(config.timeouts.command(), config.timeouts.dumpsys());
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| runner.command_timeout());

            let result = runner.run(&argv, timeout).await;
            print_result(&result, json)?;
            Ok(outcome_of(&result))
        }

        Commands::Shell { timeout, json, args } => {
            let runner = config.command_runner()?;
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| runner.command_timeout());

            let result = runner.bridge_command(&args, timeout).await;
            print_result(&result, json)?;
            Ok(outcome_of(&result))
        }

        Commands::Dumpsys {
            service,
            timeout,
            save_as,
        } => {
            let runner = config.command_runner()?;
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| runner.dumpsys_timeout());

            let result = runner.run_dump(&service.join(" "), timeout).await;
            print_result(&result, false)?;

            if let Some(name) = save_as {
                let path = save_report(&global.reports_dir(config), &name, result.text())?;
                eprintln!("Saved report: {}", path.display());
            }

            Ok(outcome_of(&result))
        }

        Commands::Caps { list } => {
            let file = &config.capabilities.file;
            let selected = resolve_profile(
                global.profile.as_deref(),
                &config.capabilities.default_profile,
            );

            if list {
                let names = Capabilities::list(file)?;
                if names.is_empty() {
                    println!("No profiles in {}", file.display());
                }
                for name in names {
                    if name == selected {
                        println!("* {}", name.green());
                    } else {
                        println!("  {}", name);
                    }
                }
                return Ok(Outcome::Success);
            }

            let caps = Capabilities::load(file, &selected)?;
            println!("Profile: {}", caps.profile.bold());
            match caps.app_package() {
                Ok(package) => println!("App package: {}", package),
                Err(_) => println!("App package: {}", "(none)".yellow()),
            }
            println!("{}", serde_json::to_string_pretty(&caps.as_value())?);
            Ok(Outcome::Success)
        }

        Commands::LogcatContext { lines } => {
            let runner = config.command_runner()?;
            let lines = lines.unwrap_or(config.logcat.context_lines);
            let context = runner
                .logcat_error_context(&config.logcat.error_keywords, lines)
                .await;
            println!("{}", context);
            Ok(Outcome::Success)
        }
    }
}

/// Run suites in order, write the HTML summary and report whether all passed
async fn run_tests(paths: &[PathBuf], global: &GlobalOptions, config: &Config) -> Result<Outcome> {
    // Parse every suite up front so a typo fails before anything touches the device
    let suites = paths
        .iter()
        .map(|path| load_suite(path))
        .collect::<Result<Vec<TestSuite>>>()?;

    let reports_dir = global.reports_dir(config);
    let needs_session = suites.iter().any(|s| s.session);
    let caps = load_capabilities(global, config, needs_session)?;
    let app_package = match &caps {
        Some(caps) => caps.app_package()?,
        None => {
            tracing::warn!("No capability profile loaded; ${{app_package}} expands to an empty string");
            String::new()
        }
    };

    let commands = config.command_runner()?;
    let mut report = ReportAggregator::new();
    let mut failed = 0;

    for suite in &suites {
        let mut runner = SuiteRunner::new(commands.clone(), app_package.clone(), &reports_dir)
            .with_log_context(
                config.logcat.error_keywords.clone(),
                config.logcat.context_lines,
            )
            .verbose(global.verbose);

        if suite.session {
            let caps = caps
                .as_ref()
                .ok_or_else(|| Error::Internal("capabilities not loaded".to_string()))?;
            let session = WebDriverSession::create(
                &config.endpoint.url,
                caps,
                Duration::from_secs(config.endpoint.implicit_wait_secs),
            )
            .await;

            match session {
                Ok(session) => runner = runner.with_driver(Box::new(session)),
                Err(e) => {
                    // Without a session no test in the suite can run
                    println!(
                        "\n{} {}: {}",
                        "✗".red().bold(),
                        suite.name.white().bold(),
                        e
                    );
                    tracing::error!("Suite {} skipped: {}", suite.name, e);
                    for test in &suite.tests {
                        report.record(TestRecord::fail(&test.name, format!("Exception: {}", e), None));
                    }
                    failed += suite.tests.len();
                    continue;
                }
            }
        }

        let result = runner.run_suite(suite, &mut report).await;
        runner.shutdown().await;
        failed += result.failed;
    }

    report.finalize(&app_package, &reports_dir)?;

    let passed = report.passed();
    let summary = format!("{} passed, {} failed", passed, failed);
    if failed == 0 {
        println!("\n{}", summary.green().bold());
        Ok(Outcome::Success)
    } else {
        println!("\n{}", summary.red().bold());
        Ok(Outcome::Failed)
    }
}

/// Capabilities are required for UI suites and optional otherwise
fn load_capabilities(
    global: &GlobalOptions,
    config: &Config,
    required: bool,
) -> Result<Option<Capabilities>> {
    let file = &config.capabilities.file;
    if !required && !file.exists() {
        return Ok(None);
    }
    let profile = resolve_profile(
        global.profile.as_deref(),
        &config.capabilities.default_profile,
    );
    Capabilities::load(file, &profile).map(Some)
}

fn print_result(result: &CommandResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    print!("{}", result.text());
    if !result.text().ends_with('\n') && !result.text().is_empty() {
        println!();
    }

    match result.error_kind {
        ErrorKind::None => {}
        ErrorKind::DecodeIssue => eprintln!("{}", "(invalid UTF-8 dropped from output)".yellow()),
        ErrorKind::Timeout => {}
        ErrorKind::ProcessFailure => {
            if let Some(code) = result.exit_code {
                eprintln!("{}", format!("(exit code {})", code).red());
            }
        }
    }
    Ok(())
}

fn outcome_of(result: &CommandResult) -> Outcome {
    if result.succeeded {
        Outcome::Success
    } else {
        Outcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_dir_override() {
        let config = Config::parse("[reports]\ndir = \"from-config\"").unwrap();
        let mut global = GlobalOptions::default();
        assert_eq!(global.reports_dir(&config), PathBuf::from("from-config"));

        global.reports_dir = Some(PathBuf::from("from-flag"));
        assert_eq!(global.reports_dir(&config), PathBuf::from("from-flag"));
    }

    #[test]
    fn test_capabilities_optional_without_ui_suites() {
        let config = Config::parse("[capabilities]\nfile = \"/nonexistent/capabilities.json\"").unwrap();
        let global = GlobalOptions::default();
        assert!(load_capabilities(&global, &config, false).unwrap().is_none());
        assert!(load_capabilities(&global, &config, true).is_err());
    }

    #[test]
    fn test_outcome_of() {
        assert_eq!(outcome_of(&CommandResult::timeout("ERROR: Timeout running command")), Outcome::Failed);
    }
}
