//! Logging and tracing configuration
//!
//! The CLI logs to stderr. Suite runs additionally write a plain-text
//! `run.log` next to their reports so the command trail survives the run.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths::RUN_LOG_FILE_NAME;

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("droidcheck=debug,warn")
        } else {
            EnvFilter::new("droidcheck=info,warn")
        }
    })
}

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for a suite run (stderr + `<reports_dir>/run.log`)
///
/// The returned guard flushes the file writer when dropped and must be held
/// for the whole run. Falls back to stderr only if the directory is unusable.
pub fn init_run(reports_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(reports_dir) {
        eprintln!("Warning: Could not create reports directory: {}", e);
        init_cli(verbose);
        return None;
    }

    // One run per log, like the HTML summary
    if let Err(e) = std::fs::File::create(reports_dir.join(RUN_LOG_FILE_NAME)) {
        eprintln!("Warning: Could not reset {}: {}", RUN_LOG_FILE_NAME, e);
    }

    let file_appender = tracing_appender::rolling::never(reports_dir, RUN_LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Some(guard)
}
