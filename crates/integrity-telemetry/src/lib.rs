//! # Integrity Telemetry
//!
//! Logging initialisation shared by the integrity session binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use integrity_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::for_binary("integrity-watch"))?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `INTEGRITY_SERVICE_NAME` | `integrity-session` | Service name on log lines |
//! | `INTEGRITY_LOG_LEVEL` | `info` | Level or `EnvFilter` directive (`RUST_LOG` is also read) |
//! | `INTEGRITY_CONSOLE_OUTPUT` | `true` | Write logs to stderr |
//! | `INTEGRITY_JSON_LOGS` | `false` | JSON lines, defaults to true in containers |
//! | `NO_COLOR` | unset | Disable ANSI colours |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Convenience macro for creating a span scoped to one submission.
///
/// # Example
///
/// ```rust,ignore
/// use integrity_telemetry::submission_span;
///
/// let span = submission_span!("watch", submission_id = %id);
/// let _enter = span.enter();
/// ```
#[macro_export]
macro_rules! submission_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
