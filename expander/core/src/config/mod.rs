//! TOML Configuration File Support
//!
//! Centralized configuration loading for the expander, from a TOML file at
//! `~/.config/adaptive-expander/expander.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/adaptive-expander/expander.toml` (typically
//!   `~/.config/adaptive-expander/expander.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! frontend = "desktop"
//!
//! [siyuan]
//! base_url = "http://127.0.0.1:6806"
//! token = "your-api-token"
//! timeout_ms = 5000
//!
//! [tracker]
//! register_delay_ms = 100
//! cancel_in_flight_on_deactivate = false
//!
//! [debug]
//! enabled = true
//! path = "detail.protyle.block.id"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frontend::Frontend;
use crate::tracker::DEFAULT_REGISTER_DELAY;

/// Default SiYuan kernel address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:6806";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[siyuan]` section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiyuanToml {
    /// Kernel base URL
    pub base_url: Option<String>,

    /// API token
    pub token: Option<String>,

    /// Request timeout in milliseconds (0 = no timeout)
    pub timeout_ms: Option<u64>,
}

/// `[tracker]` section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerToml {
    /// Delay before an unfolded block is tracked, in milliseconds
    pub register_delay_ms: Option<u64>,

    /// Whether deactivation aborts in-flight handlers
    pub cancel_in_flight_on_deactivate: Option<bool>,
}

/// `[debug]` section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugToml {
    /// Whether the debug probe is subscribed
    pub enabled: Option<bool>,

    /// Dot-separated path of the event field to log
    pub path: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderToml {
    /// Host front-end name
    pub frontend: Option<String>,

    /// Kernel API section
    pub siyuan: SiyuanToml,

    /// Tracker section
    pub tracker: TrackerToml,

    /// Debug probe section
    pub debug: DebugToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// SiYuan kernel connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiyuanConfig {
    /// Kernel base URL
    pub base_url: String,
    /// API token, if the kernel requires one
    pub token: Option<String>,
    /// Per-request timeout (`None` = no timeout)
    pub timeout: Option<Duration>,
}

impl Default for SiyuanConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: None,
        }
    }
}

/// Tracker behavior settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay between an acknowledged unfold and tracking the block
    pub register_delay: Duration,
    /// Abort in-flight handlers on deactivation instead of letting them finish
    pub cancel_in_flight_on_deactivate: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            register_delay: DEFAULT_REGISTER_DELAY,
            cancel_in_flight_on_deactivate: false,
        }
    }
}

/// Debug probe settings
///
/// The probe is only built and subscribed when `enabled` is set. An empty
/// `path` logs the whole event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebugConfig {
    /// Subscribe the debug probe
    pub enabled: bool,
    /// Dot-separated path of the event field to log
    pub path: String,
}

/// Centralized configuration for the expander
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ExpanderConfig {
    /// Kernel connection
    pub siyuan: SiyuanConfig,

    /// Tracker behavior
    pub tracker: TrackerConfig,

    /// Debug probe
    pub debug: DebugConfig,

    /// Host front-end
    pub frontend: Frontend,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            siyuan: SiyuanConfig::default(),
            tracker: TrackerConfig::default(),
            debug: DebugConfig::default(),
            frontend: Frontend::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ExpanderConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the kernel URL is not an
    /// `http://` or `https://` URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.siyuan.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "siyuan.base_url must be an http(s) URL, got '{url}'"
            )));
        }
        Ok(())
    }
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/adaptive-expander/expander.toml` or
/// `~/.config/adaptive-expander/expander.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("adaptive-expander").join("expander.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or if the result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<ExpanderConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ExpanderConfig, ConfigError> {
    let mut config = ExpanderConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ExpanderToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ExpanderConfig, toml: &ExpanderToml) -> Result<(), ConfigError> {
    if let Some(ref name) = toml.frontend {
        config.frontend = name.parse().map_err(ConfigError::ValidationError)?;
    }

    if let Some(ref url) = toml.siyuan.base_url {
        config.siyuan.base_url = url.clone();
    }
    if toml.siyuan.token.is_some() {
        config.siyuan.token = toml.siyuan.token.clone();
    }
    if let Some(ms) = toml.siyuan.timeout_ms {
        config.siyuan.timeout = timeout_from_ms(ms);
    }

    if let Some(ms) = toml.tracker.register_delay_ms {
        config.tracker.register_delay = Duration::from_millis(ms);
    }
    if let Some(cancel) = toml.tracker.cancel_in_flight_on_deactivate {
        config.tracker.cancel_in_flight_on_deactivate = cancel;
    }

    if let Some(enabled) = toml.debug.enabled {
        config.debug.enabled = enabled;
    }
    if let Some(ref path) = toml.debug.path {
        config.debug.path = path.clone();
    }

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ExpanderConfig) {
    apply_env_with(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an environment lookup
///
/// Unparseable numeric or front-end values are ignored with a warning.
fn apply_env_with<F>(config: &mut ExpanderConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("SIYUAN_API_URL") {
        config.siyuan.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(token) = lookup("SIYUAN_API_TOKEN") {
        config.siyuan.token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("SIYUAN_API_TIMEOUT_MS") {
        match timeout.parse::<u64>() {
            Ok(ms) => {
                config.siyuan.timeout = timeout_from_ms(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid SIYUAN_API_TIMEOUT_MS"),
        }
    }

    if let Some(delay) = lookup("EXPANDER_REGISTER_DELAY_MS") {
        match delay.parse::<u64>() {
            Ok(ms) => {
                config.tracker.register_delay = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %delay, "Ignoring invalid EXPANDER_REGISTER_DELAY_MS"),
        }
    }
    if let Some(cancel) = lookup("EXPANDER_CANCEL_ON_DEACTIVATE") {
        config.tracker.cancel_in_flight_on_deactivate = parse_flag(&cancel);
        config.source = ConfigSource::Env;
    }

    if let Some(enabled) = lookup("EXPANDER_DEBUG") {
        config.debug.enabled = parse_flag(&enabled);
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup("EXPANDER_DEBUG_PATH") {
        config.debug.path = path;
        config.source = ConfigSource::Env;
    }

    if let Some(name) = lookup("EXPANDER_FRONTEND") {
        match name.parse::<Frontend>() {
            Ok(frontend) => {
                config.frontend = frontend;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid EXPANDER_FRONTEND"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Kernel base URL override
    pub base_url: Option<String>,

    /// API token override
    pub token: Option<String>,

    /// Debug probe override
    pub debug_enabled: Option<bool>,

    /// Debug path override
    pub debug_path: Option<String>,

    /// Front-end override
    pub frontend: Option<Frontend>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set kernel base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set API token override
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Set debug probe override
    #[must_use]
    pub fn with_debug_enabled(mut self, enabled: bool) -> Self {
        self.debug_enabled = Some(enabled);
        self
    }

    /// Set debug path override
    #[must_use]
    pub fn with_debug_path(mut self, path: String) -> Self {
        self.debug_path = Some(path);
        self
    }

    /// Set front-end override
    #[must_use]
    pub fn with_frontend(mut self, frontend: Frontend) -> Self {
        self.frontend = Some(frontend);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.token.is_none()
            && self.debug_enabled.is_none()
            && self.debug_path.is_none()
            && self.frontend.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ExpanderConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.siyuan.base_url = url.clone();
        }
        if let Some(ref token) = self.token {
            config.siyuan.token = Some(token.clone());
        }
        if let Some(enabled) = self.debug_enabled {
            config.debug.enabled = enabled;
        }
        if let Some(ref path) = self.debug_path {
            config.debug.path = path.clone();
        }
        if let Some(frontend) = self.frontend {
            config.frontend = frontend;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
