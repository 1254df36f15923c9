//! Capability profiles
//!
//! A profile file is a JSON object mapping profile names to the option set
//! sent when creating an automation session:
//!
//! ```json
//! {
//!   "android_default": {
//!     "platformName": "Android",
//!     "appium:automationName": "UiAutomator2",
//!     "appium:appPackage": "com.example.app"
//!   }
//! }
//! ```

use std::path::Path;

use serde_json::{Map, Value};

use crate::common::{Error, Result};

/// Environment variable selecting the profile
pub const PROFILE_ENV: &str = "CAPS_PROFILE";

/// A loaded capability profile
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub profile: String,
    pub options: Map<String, Value>,
}

impl Capabilities {
    /// Load `profile` from `file`
    pub fn load(file: &Path, profile: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file).map_err(|e| Error::FileRead {
            path: file.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content, file, profile)
    }

    /// Select `profile` from JSON text; `file` is used in error messages
    pub fn from_json(content: &str, file: &Path, profile: &str) -> Result<Self> {
        let mut profiles: Map<String, Value> = serde_json::from_str(content)?;

        let options = match profiles.remove(profile) {
            Some(Value::Object(options)) => options,
            Some(_) => {
                return Err(Error::Config(format!(
                    "Profile '{}' in {} is not an object",
                    profile,
                    file.display()
                )))
            }
            None => {
                return Err(Error::ProfileNotFound {
                    profile: profile.to_string(),
                    file: file.to_path_buf(),
                })
            }
        };

        Ok(Self {
            profile: profile.to_string(),
            options,
        })
    }

    /// List profile names in `file`, sorted
    pub fn list(file: &Path) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(file).map_err(|e| Error::FileRead {
            path: file.display().to_string(),
            error: e.to_string(),
        })?;
        let profiles: Map<String, Value> = serde_json::from_str(&content)?;
        let mut names: Vec<String> = profiles.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Package under test (`appium:appPackage`, falling back to `appPackage`)
    pub fn app_package(&self) -> Result<String> {
        ["appium:appPackage", "appPackage"]
            .iter()
            .find_map(|key| self.options.get(*key).and_then(Value::as_str))
            .filter(|pkg| !pkg.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::MissingAppPackage(self.profile.clone()))
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.options.clone())
    }
}

/// Resolve the profile name: explicit flag, then `CAPS_PROFILE`, then `default`
pub fn resolve_profile(explicit: Option<&str>, default: &str) -> String {
    if let Some(profile) = explicit {
        return profile.to_string();
    }
    std::env::var(PROFILE_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| default.to_string())
}
