//! Remote UI-automation session
//!
//! Test steps talk to the app through [`UiDriver`]. The production
//! implementation is [`WebDriverSession`], a thin W3C WebDriver client for an
//! Appium-compatible endpoint.

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::Result;

pub use client::WebDriverSession;

/// How to find an element on screen
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// Resource id, e.g. `com.example:id/button10`
    Id(String),
    Xpath(String),
    AccessibilityId(String),
    ClassName(String),
}

impl Locator {
    /// WebDriver strategy name and selector value
    pub fn strategy(&self) -> (&'static str, &str) {
        match self {
            Locator::Id(v) => ("id", v),
            Locator::Xpath(v) => ("xpath", v),
            Locator::AccessibilityId(v) => ("accessibility id", v),
            Locator::ClassName(v) => ("class name", v),
        }
    }

    /// Same locator with its selector rewritten
    pub fn map_value<F>(&self, f: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        Ok(match self {
            Locator::Id(v) => Locator::Id(f(v)?),
            Locator::Xpath(v) => Locator::Xpath(f(v)?),
            Locator::AccessibilityId(v) => Locator::AccessibilityId(f(v)?),
            Locator::ClassName(v) => Locator::ClassName(f(v)?),
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (using, value) = self.strategy();
        write!(f, "{} '{}'", using, value)
    }
}

/// Screen orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "PORTRAIT",
            Orientation::Landscape => "LANDSCAPE",
        }
    }
}

/// Opaque element reference returned by the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

/// Operations the test steps need from a UI session
#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>>;

    async fn find_element(&self, locator: &Locator) -> Result<ElementId>;

    async fn click(&self, element: &ElementId) -> Result<()>;

    async fn element_text(&self, element: &ElementId) -> Result<String>;

    async fn is_displayed(&self, element: &ElementId) -> Result<bool>;

    async fn back(&self) -> Result<()>;

    async fn orientation(&self) -> Result<Orientation>;

    async fn set_orientation(&self, orientation: Orientation) -> Result<()>;

    /// Send the app to the background for `seconds`
    async fn background_app(&self, seconds: u64) -> Result<()>;

    async fn activate_app(&self, app_id: &str) -> Result<()>;

    async fn terminate_app(&self, app_id: &str) -> Result<()>;

    /// Press an Android key (3 = HOME, 4 = BACK, 82 = MENU)
    async fn press_keycode(&self, keycode: i64) -> Result<()>;

    /// Pull down the notification shade
    async fn open_notifications(&self) -> Result<()>;

    /// Messages from an endpoint-side log such as `logcat`, oldest first
    async fn log_messages(&self, log_type: &str) -> Result<Vec<String>>;

    /// Run an endpoint-side script such as `mobile: shell`
    async fn execute_script(&self, script: &str, args: serde_json::Value)
        -> Result<serde_json::Value>;

    /// End the session
    async fn quit(&self) -> Result<()>;
}
