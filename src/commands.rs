//! CLI command definitions
//!
//! Defines the clap commands for the droidcheck CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more YAML test suites and write the HTML summary
    Test {
        /// Paths to suite files, run in the order given
        #[arg(required = true)]
        suites: Vec<PathBuf>,
    },

    /// Run a host command with a timeout and print its result
    Exec {
        /// Timeout in seconds (default: [timeouts] command_secs)
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,

        /// Program and arguments
        #[arg(last = true, required = true)]
        argv: Vec<String>,
    },

    /// Run a debug bridge command (e.g. `droidcheck shell -- shell pm list packages`)
    Shell {
        /// Timeout in seconds (default: [timeouts] command_secs)
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,

        /// Arguments passed to the bridge
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },

    /// Capture a diagnostic dump (`<bridge> shell dumpsys <service>`)
    Dumpsys {
        /// Service and arguments, e.g. `activity broadcasts`
        #[arg(required = true)]
        service: Vec<String>,

        /// Timeout in seconds (default: [timeouts] dumpsys_secs)
        #[arg(long)]
        timeout: Option<u64>,

        /// Also save the dump as a text report under this test name
        #[arg(long)]
        save_as: Option<String>,
    },

    /// List capability profiles or show the selected one
    Caps {
        /// List profile names only
        #[arg(long)]
        list: bool,
    },

    /// Print the device log around the first error line
    LogcatContext {
        /// Lines of context on each side (default: [logcat] context_lines)
        #[arg(long, short = 'n')]
        lines: Option<usize>,
    },
}
