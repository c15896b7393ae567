//! Error types for the submission session

use shared_types::{InvalidIdentifier, ReportFetchError, TransportError};
use thiserror::Error;

/// Session-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No submission has been started
    #[error("no submission is active")]
    NotStarted,

    /// The session was reset while a caller was waiting on it
    #[error("session was reset")]
    Reset,

    /// The event connection failed before the analysis completed
    #[error("session failed: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors from the submission service HTTP API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The document or module selection was rejected before upload
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// Local file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Server returned 401
    #[error("unauthorized")]
    Unauthorized,

    /// Server returned 404
    #[error("not found")]
    NotFound,

    /// Any other non-success status
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Could not reach the server
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request failed in flight
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected shape
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// An identifier returned by the server was not acceptable
    #[error("invalid identifier: {0}")]
    Identifier(#[from] InvalidIdentifier),
}

impl From<ApiError> for ReportFetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound => ReportFetchError::NotFound,
            ApiError::Unauthorized => ReportFetchError::Unauthorized,
            ApiError::Status { status, .. } => ReportFetchError::Http { status },
            ApiError::Parse(reason) => ReportFetchError::Parse(reason),
            other => ReportFetchError::Request(other.to_string()),
        }
    }
}
