//! Typed analysis events, as produced by the decoder.

use shared_types::{FinalScore, ModuleId, ModuleResult};

/// A validated event from the analysis stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One module finished (successfully or not).
    ModuleComplete(ModuleResult),
    /// The aggregate verdict. Terminal for the session.
    Completed(Completion),
    /// Informational event. Never changes results.
    Notice(Notice),
}

impl Event {
    /// Wire name of the event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ModuleComplete(_) => "module_complete",
            Event::Completed(_) => "completed",
            Event::Notice(notice) => notice.type_name(),
        }
    }

    /// Module the event refers to, if any.
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            Event::ModuleComplete(result) => Some(result.module_id),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Event::Completed(_))
    }
}

/// Payload of a `completed` event.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub final_score: FinalScore,
    /// Set when the server finished without running any module.
    pub error: Option<String>,
}

impl Completion {
    pub fn new(final_score: FinalScore) -> Self {
        Self {
            final_score,
            error: None,
        }
    }
}

/// Informational events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server began running modules.
    AnalysisStarted,
    /// The server stopped waiting for module results. A close follows.
    Timeout,
    /// The server reported an error without closing the stream.
    ServerError(String),
}

impl Notice {
    pub fn type_name(&self) -> &'static str {
        match self {
            Notice::AnalysisStarted => "analysis_started",
            Notice::Timeout => "timeout",
            Notice::ServerError(_) => "error",
        }
    }
}
