//! # Update Subscriber
//!
//! An observer's handle on the bus. Every update is an owned copy, so
//! nothing a subscriber does can reach back into session state.
//!
//! A slow subscriber that falls behind loses the oldest updates and resumes
//! at the newest. For snapshots that is harmless since each one supersedes
//! the last; the loss is logged so it shows up when errors go missing too.

use crate::events::{SessionUpdate, UpdateFilter};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The session owning the bus is gone.
    #[error("Update bus closed")]
    Closed,
}

/// Live subscription to one session's updates. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<SessionUpdate>,
    filter: UpdateFilter,
    skipped: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<SessionUpdate>, filter: UpdateFilter) -> Self {
        Self {
            receiver,
            filter,
            skipped: 0,
        }
    }

    /// Next update matching the filter, or `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<SessionUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) if self.filter.matches(&update) => return Some(update),
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => self.fell_behind(count),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Like [`recv`](Self::recv) but returns `Ok(None)` instead of waiting.
    pub fn try_recv(&mut self) -> Result<Option<SessionUpdate>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) if self.filter.matches(&update) => return Ok(Some(update)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(count)) => self.fell_behind(count),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn fell_behind(&mut self, count: u64) {
        self.skipped += count;
        debug!(
            skipped = count,
            total_skipped = self.skipped,
            kinds = ?self.filter.kinds,
            "Subscriber fell behind, oldest session updates dropped"
        );
    }
}
