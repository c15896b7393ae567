//! # Session Updates
//!
//! Everything a session publishes to its subscribers.

use shared_types::{ReportFetchError, SessionState, SubmissionId, TransportError};

/// One published update.
///
/// Snapshots are owned clones of the session state; mutating a received
/// snapshot never affects the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The session state changed.
    Snapshot(SessionState),

    /// The connection failed or closed before completion. The session is
    /// now `closed` without a verdict.
    TransportError {
        submission_id: SubmissionId,
        error: TransportError,
    },

    /// The post-completion report fetch failed. The streamed verdict stands.
    ReportFetchError {
        submission_id: SubmissionId,
        error: ReportFetchError,
    },
}

impl SessionUpdate {
    /// Kind of this update, for filtering.
    pub fn kind(&self) -> UpdateKind {
        match self {
            SessionUpdate::Snapshot(_) => UpdateKind::Snapshot,
            SessionUpdate::TransportError { .. } => UpdateKind::TransportError,
            SessionUpdate::ReportFetchError { .. } => UpdateKind::ReportFetchError,
        }
    }

    /// The snapshot carried by this update, if any.
    pub fn snapshot(&self) -> Option<&SessionState> {
        match self {
            SessionUpdate::Snapshot(state) => Some(state),
            _ => None,
        }
    }

    /// Whether this update reports an error condition.
    pub fn is_error(&self) -> bool {
        !matches!(self, SessionUpdate::Snapshot(_))
    }
}

/// Update categories for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Snapshot,
    TransportError,
    ReportFetchError,
}

/// Filter for subscribing to a subset of updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateFilter {
    /// Kinds to receive. Empty means all.
    pub kinds: Vec<UpdateKind>,
}

impl UpdateFilter {
    /// Receive every update.
    #[must_use]
    pub fn all() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Receive only the given kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<UpdateKind>) -> Self {
        Self { kinds }
    }

    /// Receive only the error updates.
    #[must_use]
    pub fn errors() -> Self {
        Self::kinds(vec![UpdateKind::TransportError, UpdateKind::ReportFetchError])
    }

    /// Check whether an update passes this filter.
    pub fn matches(&self, update: &SessionUpdate) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&update.kind())
    }
}
