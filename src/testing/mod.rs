//! Suite runner
//!
//! Reads YAML test suites and runs their steps against the debug bridge and
//! an optional UI session, recording each test in a
//! [`ReportAggregator`](crate::report::ReportAggregator).

mod config;
mod expect;
mod runner;

pub use config::*;
pub use expect::Expectation;
pub use runner::{SuiteResult, SuiteRunner, APP_PACKAGE_VAR, ERROR_SECTION};
