//! droidcheck - Android receiver and UI test harness
//!
//! Runs YAML test suites against a device through the debug bridge and an
//! Appium-compatible automation endpoint, then writes per-test text reports
//! and an HTML summary.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use droidcheck::cli::{self, GlobalOptions, Outcome};
use droidcheck::common::logging;
use droidcheck::commands;

#[derive(Parser)]
#[command(name = "droidcheck", about = "Android receiver and UI test harness")]
#[command(version, long_about = None)]
struct Cli {
    /// Capability profile (overrides CAPS_PROFILE)
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Directory for text reports, run.log and the HTML summary
    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,

    /// Config file (overrides DROIDCHECK_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging and step output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let global = GlobalOptions {
        profile: cli.profile,
        reports_dir: cli.reports_dir,
        config: cli.config,
        verbose: cli.verbose,
    };

    let config = match global.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Suite runs keep a run.log beside their reports
    let guard = match &cli.command {
        Commands::Test { .. } => logging::init_run(&global.reports_dir(&config), global.verbose),
        _ => {
            logging::init_cli(global.verbose);
            None
        }
    };

    let result = cli::dispatch(cli.command, &global, &config).await;

    // Flush run.log; process::exit skips destructors
    drop(guard);

    match result {
        Ok(Outcome::Success) => {}
        Ok(Outcome::Failed) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
