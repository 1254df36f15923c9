//! Error types for droidcheck
//!
//! Command execution never produces these: the runners in [`crate::exec`]
//! encode every failure in their [`crate::exec::CommandResult`]. These errors
//! cover everything around them (configuration, capability profiles, the
//! automation session, suite files and assertions).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for droidcheck
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Debug bridge '{0}' not found in PATH. Set [bridge] path in config.toml")]
    BridgeNotFound(String),

    // === Capability Errors ===
    #[error("Profile '{profile}' not found in {}", file.display())]
    ProfileNotFound { profile: String, file: PathBuf },

    #[error("Capability profile '{0}' has no appPackage")]
    MissingAppPackage(String),

    // === Session Errors ===
    #[error("Failed to create automation session at {endpoint}: {message}")]
    SessionCreate { endpoint: String, message: String },

    #[error("No automation session. Set 'session: true' in the suite to use UI steps")]
    SessionNotActive,

    #[error("Automation command '{command}' failed: {message}")]
    WebDriver { command: String, message: String },

    #[error("No element found using {using} '{value}'")]
    ElementNotFound { using: String, value: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Suite Errors ===
    #[error("Invalid test suite '{path}': {message}")]
    Suite { path: String, message: String },

    #[error("Variable '{0}' is not defined")]
    UnknownVariable(String),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a WebDriver command failure
    pub fn webdriver(command: &str, message: impl Into<String>) -> Self {
        Self::WebDriver {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Create an element lookup failure
    pub fn element_not_found(using: &str, value: &str) -> Self {
        Self::ElementNotFound {
            using: using.to_string(),
            value: value.to_string(),
        }
    }

    /// Create a suite parse/validation failure
    pub fn suite(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Suite {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// The bare message of a failed expectation, `None` for environment errors
    pub fn assertion_message(&self) -> Option<&str> {
        match self {
            Self::TestAssertion(message) => Some(message),
            _ => None,
        }
    }
}
