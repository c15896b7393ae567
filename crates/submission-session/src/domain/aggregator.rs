//! # Result Aggregator
//!
//! Pure state transitions over [`SessionState`]. No I/O, no clocks, no
//! hidden state: the same inputs always produce the same output.
//!
//! ## Fold Rules
//!
//! | Event | Before `completed` | After `completed` |
//! |-------|--------------------|-------------------|
//! | `module_complete` | overwrite `results[module_id]` | rejected |
//! | `completed` | set verdict, close | rejected |
//! | notice | ignored | ignored |

use shared_types::{ConnectionStatus, IntegrityReport, ReportSummary, SessionState};

use super::events::Event;

/// What a fold did with its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The event changed the state.
    Applied,
    /// The session already has its verdict; the event was discarded.
    RejectedAfterCompletion,
    /// The event carries nothing to fold.
    Ignored,
}

impl FoldOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FoldOutcome::Applied)
    }
}

/// Fold one event, reporting what happened.
pub fn apply(mut state: SessionState, event: &Event) -> (SessionState, FoldOutcome) {
    match event {
        Event::Notice(_) => (state, FoldOutcome::Ignored),
        _ if state.completed => (state, FoldOutcome::RejectedAfterCompletion),
        Event::ModuleComplete(result) => {
            state.results.insert(result.module_id, result.clone());
            (state, FoldOutcome::Applied)
        }
        Event::Completed(completion) => {
            state.final_score = Some(completion.final_score);
            state.completed = true;
            state.connection_status = ConnectionStatus::Closed;
            (state, FoldOutcome::Applied)
        }
    }
}

/// Fold one event.
pub fn fold(state: SessionState, event: &Event) -> SessionState {
    apply(state, event).0
}

/// The canonical empty state.
pub fn reset() -> SessionState {
    SessionState::idle()
}

/// Merge the post-completion report into a completed state.
///
/// Only `weight` and `evidence` are copied, and only onto modules the stream
/// already delivered. The verdict is left alone.
pub fn merge_report(mut state: SessionState, report: &IntegrityReport) -> SessionState {
    for (module_id, result) in state.results.iter_mut() {
        if let Some(breakdown) = report.module(*module_id) {
            if breakdown.weight.is_some() {
                result.weight = breakdown.weight;
            }
            if breakdown.evidence.is_some() {
                result.evidence = breakdown.evidence.clone();
            }
        }
    }
    state.report = Some(ReportSummary::from(report));
    state
}
