//! Front-end detection
//!
//! The host reports which front-end it is running in. The expander records
//! whether that front-end is a mobile one and reports it at activation; the
//! tracker behaves the same everywhere.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Host front-end
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frontend {
    /// Desktop application
    #[default]
    Desktop,
    /// Secondary desktop window
    DesktopWindow,
    /// Native mobile application
    Mobile,
    /// Desktop browser
    BrowserDesktop,
    /// Mobile browser
    BrowserMobile,
}

impl Frontend {
    /// Host front-end name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::DesktopWindow => "desktop-window",
            Self::Mobile => "mobile",
            Self::BrowserDesktop => "browser-desktop",
            Self::BrowserMobile => "browser-mobile",
        }
    }

    /// Whether this front-end runs on a mobile device
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        matches!(self, Self::Mobile | Self::BrowserMobile)
    }
}

impl std::fmt::Display for Frontend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frontend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "desktop-window" => Ok(Self::DesktopWindow),
            "mobile" => Ok(Self::Mobile),
            "browser-desktop" => Ok(Self::BrowserDesktop),
            "browser-mobile" => Ok(Self::BrowserMobile),
            other => Err(format!("unknown front-end '{other}'")),
        }
    }
}
