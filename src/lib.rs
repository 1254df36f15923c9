//! droidcheck - Android receiver and UI test harness
//!
//! Command execution with timeouts against the debug bridge, a W3C WebDriver
//! session client, a YAML suite runner and report generation.

pub mod capabilities;
pub mod cli;
pub mod commands;
pub mod common;
pub mod exec;
pub mod report;
pub mod session;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use exec::{CommandResult, CommandRunner, ErrorKind};
