//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every event
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `submission_session=debug,info`
    pub log_level: String,

    /// Whether to write logs to stderr at all
    pub console_output: bool,

    /// Whether to emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Whether to colour human-readable output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "integrity-session".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `INTEGRITY_SERVICE_NAME`: Service name (default: integrity-session)
    /// - `INTEGRITY_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `INTEGRITY_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `INTEGRITY_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `NO_COLOR`: Disable ANSI colours when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("INTEGRITY_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("INTEGRITY_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: lookup("INTEGRITY_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),

            json_logs: lookup("INTEGRITY_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            ansi: lookup("NO_COLOR").is_none(),
        }
    }

    /// Configuration for a named binary.
    pub fn for_binary(name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = name.to_string();
        config
    }

    /// Raise verbosity by `count` levels above the configured one.
    ///
    /// Full `EnvFilter` directives are left untouched.
    #[must_use]
    pub fn with_verbosity(mut self, count: u8) -> Self {
        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

        if count == 0 {
            return self;
        }
        if let Some(index) = LEVELS.iter().position(|l| *l == self.log_level) {
            let raised = (index + usize::from(count)).min(LEVELS.len() - 1);
            self.log_level = LEVELS[raised].to_string();
        }
        self
    }
}
