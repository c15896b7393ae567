//! # Error Types
//!
//! The error taxonomy of a submission session.
//!
//! | Error | Visible to subscribers | Fatal to the session |
//! |-------|------------------------|----------------------|
//! | `TransportError` | yes | yes, session closes as failed |
//! | `ReportFetchError` | yes | no, the streamed verdict stands |
//! | `DecodeError` | no | no, the frame is dropped |

use std::time::Duration;

use thiserror::Error;

/// Rejected identifier or enumeration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentifier {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier too long: {len} characters")]
    TooLong { len: usize },

    #[error("illegal character {0:?} in identifier")]
    IllegalChar(char),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("unknown risk level: {0}")]
    UnknownRiskLevel(String),
}

/// The event connection failed to open or ended before `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Handshake or TCP connect failed.
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// Handshake did not finish in time.
    #[error("timed out connecting to {url} after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// Read error on an established connection.
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// No frame arrived within the heartbeat window.
    #[error("no frame received for {silence:?}")]
    HeartbeatTimeout { silence: Duration },

    /// Server closed the connection before the analysis completed.
    #[error("server closed the connection before completion{}", fmt_close(.code, .reason))]
    ClosedBeforeCompletion { code: Option<u16>, reason: String },

    /// Server announced it gave up waiting for analysis events.
    #[error("server timed out waiting for analysis events")]
    ServerTimeout,

    /// Every reconnection attempt failed.
    #[error("reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

fn fmt_close(code: &Option<u16>, reason: &str) -> String {
    match (*code, reason.is_empty()) {
        (None, true) => String::new(),
        (None, false) => format!(": {reason}"),
        (Some(code), true) => format!(" (code {code})"),
        (Some(code), false) => format!(" (code {code}): {reason}"),
    }
}

/// A single malformed frame. Handled inside the decoder boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    NotJson(String),

    #[error("frame does not match any event shape: {0}")]
    Malformed(String),

    #[error("unrecognized event type: {0}")]
    UnknownType(String),

    #[error("unknown module id: {0}")]
    UnknownModule(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid risk level: {0}")]
    InvalidRiskLevel(String),
}

/// The post-completion report fetch failed. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportFetchError {
    #[error("report not found")]
    NotFound,

    #[error("not authorized to read the report")]
    Unauthorized,

    #[error("report endpoint returned HTTP {status}")]
    Http { status: u16 },

    #[error("report request failed: {0}")]
    Request(String),

    #[error("report body could not be parsed: {0}")]
    Parse(String),
}
