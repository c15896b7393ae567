//! Session configuration with validation.
//!
//! Loadable from a TOML file or from `INTEGRITY_*` environment variables.
//!
//! ```toml
//! ws_base_url = "wss://integrity.example.edu"
//! api_base_url = "https://integrity.example.edu/api/v1"
//! request_timeout = "30s"
//! heartbeat_timeout = "90s"
//!
//! [reconnect]
//! max_attempts = 5
//! base_delay = "2s"
//! max_delay = "60s"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `ws_base_url`.
pub const ENV_WS_URL: &str = "INTEGRITY_WS_URL";
/// Environment variable overriding `api_base_url`.
pub const ENV_API_URL: &str = "INTEGRITY_API_URL";
/// Environment variable carrying the bearer token.
pub const ENV_TOKEN: &str = "INTEGRITY_TOKEN";
/// Environment variable overriding `request_timeout`, in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "INTEGRITY_REQUEST_TIMEOUT_SECS";
/// Environment variable overriding `reconnect.max_attempts`.
pub const ENV_RECONNECT_ATTEMPTS: &str = "INTEGRITY_RECONNECT_ATTEMPTS";

/// Configuration of a submission session and its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base of the event stream URL (`ws://` or `wss://`)
    pub ws_base_url: String,
    /// Base of the REST API, including the version prefix
    pub api_base_url: String,
    /// Bearer token attached to API requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Timeout for API requests
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Timeout for opening the event connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Capacity of the connection event channel
    pub event_buffer: usize,
    /// Capacity of the subscriber update channel
    pub update_buffer: usize,
    /// Reconnection policy for the event connection
    pub reconnect: ReconnectPolicy,
    /// Treat the connection as lost after this much silence
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "ws://localhost:8000".to_string(),
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            event_buffer: 100,
            update_buffer: 256,
            reconnect: ReconnectPolicy::default(),
            heartbeat_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `INTEGRITY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `INTEGRITY_*` environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_WS_URL) {
            self.ws_base_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            self.auth_token = Some(token);
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs = secs.parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_REQUEST_TIMEOUT_SECS,
                value: secs,
            })?;
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = lookup(ENV_RECONNECT_ATTEMPTS) {
            self.reconnect.max_attempts =
                attempts.parse::<u32>().map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_RECONNECT_ATTEMPTS,
                    value: attempts,
                })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ws_base_url.starts_with("ws://") || self.ws_base_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(format!(
                "ws_base_url must use ws:// or wss://, got {}",
                self.ws_base_url
            )));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidUrl(format!(
                "api_base_url must use http:// or https://, got {}",
                self.api_base_url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect_timeout cannot be 0".into(),
            ));
        }
        if self.heartbeat_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout(
                "heartbeat_timeout cannot be 0".into(),
            ));
        }

        if self.event_buffer == 0 || self.update_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "channel buffers cannot be 0".into(),
            ));
        }

        if self.reconnect.base_delay > self.reconnect.max_delay {
            return Err(ConfigError::InvalidTimeout(
                "reconnect.base_delay exceeds reconnect.max_delay".into(),
            ));
        }

        Ok(())
    }

    /// Full URL of an API path.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Bounded exponential backoff for the event connection.
///
/// Retries happen only after transport errors, never after a clean close.
/// `max_attempts = 0` disables reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Maximum reconnection attempts after a failure
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether any retry is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before retry number `attempt` (0-based): `min(base * 2^min(attempt, 6), max)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(6);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("failed to read config {path}: {error}")]
    Io { path: String, error: String },

    /// TOML parse error
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Environment variable could not be parsed
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    /// Malformed base URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
}
