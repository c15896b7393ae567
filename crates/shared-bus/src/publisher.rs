//! # Update Publisher
//!
//! The session side of the bus. Publishing happens inside the session's
//! state lock, so it is synchronous and infallible: a snapshot nobody is
//! listening for is dropped on the floor.

use crate::events::{SessionUpdate, UpdateFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Sink for session updates.
pub trait UpdatePublisher: Send + Sync {
    /// Fan `update` out to every subscriber. Returns how many received it.
    fn publish(&self, update: SessionUpdate) -> usize;
}

/// Broadcast-backed update bus owned by one session.
///
/// Each subscriber gets its own clone of every update. A subscriber more
/// than `capacity` updates behind skips ahead to the newest ones.
pub struct InMemoryUpdateBus {
    sender: broadcast::Sender<SessionUpdate>,
}

impl InMemoryUpdateBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive updates matching `filter`, starting with the next one
    /// published.
    #[must_use]
    pub fn subscribe(&self, filter: UpdateFilter) -> Subscription {
        debug!(
            kinds = ?filter.kinds,
            subscribers = self.sender.receiver_count() + 1,
            "Session update subscription added"
        );
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Subscriptions not yet dropped.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryUpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdatePublisher for InMemoryUpdateBus {
    fn publish(&self, update: SessionUpdate) -> usize {
        let kind = update.kind();
        // `send` only fails when there are no receivers.
        let receivers = self.sender.send(update).unwrap_or(0);
        trace!(kind = ?kind, receivers, "Session update published");
        receivers
    }
}
