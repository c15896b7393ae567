//! # Shared Bus - Session Update Fan-Out
//!
//! Carries [`SessionUpdate`]s from a submission session to any number of
//! observers. A session publishes; subscribers each receive an owned copy.
//!
//! ```text
//! ┌──────────────────┐                      ┌──────────────┐
//! │ SubmissionSession│    publish()         │  Observer A  │
//! │                  │ ──────┐         ┌──▶ │              │
//! └──────────────────┘       │         │    └──────────────┘
//!                            ▼         │    ┌──────────────┐
//!                      ┌──────────────┐├──▶ │  Observer B  │
//!                      │  Update Bus  │┘    └──────────────┘
//!                      └──────────────┘  subscribe()
//! ```
//!
//! Publishing is synchronous so it can happen inside the session's state
//! lock; observers therefore see updates in the order the state changed.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{SessionUpdate, UpdateFilter, UpdateKind};
pub use publisher::{InMemoryUpdateBus, UpdatePublisher};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum updates to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
