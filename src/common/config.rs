//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use crate::exec::CommandRunner;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Debug bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Remote automation endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Report output settings
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Capability profile settings
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// Logcat error-context settings
    #[serde(default)]
    pub logcat: LogcatConfig,
}

/// Debug bridge configuration
#[derive(Debug, Deserialize, Default)]
pub struct BridgeConfig {
    /// Path to the bridge executable; searched in PATH as `adb` when unset
    pub path: Option<PathBuf>,

    /// Device serial, passed as `-s <serial>`
    pub serial: Option<String>,

    /// Extra arguments placed before every bridge command
    #[serde(default)]
    pub args: Vec<String>,
}

impl BridgeConfig {
    /// Prefix arguments: `args` followed by `-s <serial>` when set
    pub fn prefix_args(&self) -> Vec<String> {
        let mut prefix = self.args.clone();
        if let Some(serial) = &self.serial {
            prefix.push("-s".to_string());
            prefix.push(serial.clone());
        }
        prefix
    }
}

/// Automation endpoint configuration
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the automation server
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Implicit element wait applied to every new session
    #[serde(default = "default_implicit_wait")]
    pub implicit_wait_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            implicit_wait_secs: default_implicit_wait(),
        }
    }
}

fn default_endpoint_url() -> String {
    "http://localhost:4723".to_string()
}

fn default_implicit_wait() -> u64 {
    10
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Default timeout for bridge and host commands
    #[serde(default = "default_command")]
    pub command_secs: u64,

    /// Default timeout for diagnostic dumps
    #[serde(default = "default_dumpsys")]
    pub dumpsys_secs: u64,
}

impl Timeouts {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn dumpsys(&self) -> Duration {
        Duration::from_secs(self.dumpsys_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command_secs: default_command(),
            dumpsys_secs: default_dumpsys(),
        }
    }
}

fn default_command() -> u64 {
    30
}
fn default_dumpsys() -> u64 {
    60
}

/// Report output configuration
#[derive(Debug, Deserialize)]
pub struct ReportsConfig {
    /// Directory holding per-test text reports and the HTML summary
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("receiver_test_reports")
}

/// Capability profile configuration
#[derive(Debug, Deserialize)]
pub struct CapabilitiesConfig {
    /// JSON file mapping profile names to session options
    #[serde(default = "default_caps_file")]
    pub file: PathBuf,

    /// Profile used when `CAPS_PROFILE` is not set
    #[serde(default = "default_profile")]
    pub default_profile: String,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            file: default_caps_file(),
            default_profile: default_profile(),
        }
    }
}

fn default_caps_file() -> PathBuf {
    PathBuf::from("capabilities.json")
}

fn default_profile() -> String {
    "android_default".to_string()
}

/// Logcat error-context configuration
#[derive(Debug, Deserialize)]
pub struct LogcatConfig {
    /// Lowercase keywords marking an error line
    #[serde(default = "default_error_keywords")]
    pub error_keywords: Vec<String>,

    /// Lines of context kept on each side of the first match
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

impl Default for LogcatConfig {
    fn default() -> Self {
        Self {
            error_keywords: default_error_keywords(),
            context_lines: default_context_lines(),
        }
    }
}

pub fn default_error_keywords() -> Vec<String> {
    ["exception", "error", "failure", "crash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_context_lines() -> usize {
    5
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve the debug bridge executable
    ///
    /// An explicitly configured path is used as-is; otherwise `adb` must be in PATH.
    pub fn bridge_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.bridge.path {
            return Ok(path.clone());
        }
        which::which("adb").map_err(|_| Error::BridgeNotFound("adb".to_string()))
    }

    /// Build a command runner from the bridge and timeout settings
    pub fn command_runner(&self) -> Result<CommandRunner> {
        Ok(CommandRunner::new(self.bridge_path()?)
            .with_bridge_args(self.bridge.prefix_args())
            .with_timeouts(self.timeouts.command(), self.timeouts.dumpsys()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.endpoint.url, "http://localhost:4723");
        assert_eq!(config.timeouts.command_secs, 30);
        assert_eq!(config.timeouts.dumpsys_secs, 60);
        assert_eq!(config.reports.dir, PathBuf::from("receiver_test_reports"));
        assert_eq!(config.capabilities.default_profile, "android_default");
        assert_eq!(config.logcat.context_lines, 5);
        assert_eq!(config.logcat.error_keywords.len(), 4);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = Config::parse(
            r#"
[bridge]
path = "/opt/android/platform-tools/adb"

[timeouts]
dumpsys_secs = 120

[logcat]
error_keywords = ["fatal"]
"#,
        )
        .unwrap();

        assert_eq!(
            config.bridge_path().unwrap(),
            PathBuf::from("/opt/android/platform-tools/adb")
        );
        assert_eq!(config.timeouts.command_secs, 30);
        assert_eq!(config.timeouts.dumpsys(), Duration::from_secs(120));
        assert_eq!(config.logcat.error_keywords, vec!["fatal".to_string()]);
    }

    #[test]
    fn test_bridge_prefix_args() {
        let config = Config::parse(
            r#"
[bridge]
path = "sh"
args = ["/tmp/fake-adb.sh"]
serial = "emulator-5554"

[timeouts]
command_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(
            config.bridge.prefix_args(),
            vec!["/tmp/fake-adb.sh", "-s", "emulator-5554"]
        );
        let runner = config.command_runner().unwrap();
        assert_eq!(runner.bridge(), Path::new("sh"));
        assert_eq!(runner.command_timeout(), Duration::from_secs(5));
        assert_eq!(runner.dumpsys_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_config_is_parse_error() {
        let err = Config::parse("[timeouts]\ncommand_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
