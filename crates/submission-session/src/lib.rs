//! # submission-session
//!
//! Real-time submission session for document integrity analysis.
//!
//! ## Overview
//!
//! A client uploads a document, receives a submission id, and then watches
//! the analysis modules report in one by one over a WebSocket until the
//! service announces the aggregate verdict. This crate owns that stream:
//!
//! - **EventDecoder**: raw frame → typed [`Event`], malformed frames dropped
//! - **ResultAggregator**: pure fold of events into [`SessionState`]
//! - **ConnectionManager**: one live connection per submission id
//! - **SubmissionSession**: orchestration, snapshots, subscriptions and the
//!   one-shot report fetch after completion
//!
//! ## Architecture
//!
//! ```text
//! Transport ──frames──→ ConnectionManager ──ConnectionEvent──→ SubmissionSession
//!                                                                  │
//!                                          EventDecoder ←──────────┤
//!                                          aggregator::apply ←─────┤
//!                                                                  │
//!                                   UpdateBus ←──SessionUpdate─────┤
//!                                                                  │
//!                              ReportGateway ←──on completion──────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use submission_session::{HttpSubmissionApi, SessionConfig, SubmissionSession, WsTransport};
//!
//! let config = SessionConfig::from_env()?;
//! let api = HttpSubmissionApi::new(config.clone());
//! let session = SubmissionSession::new(config, WsTransport::new(), api)?;
//!
//! session.start(submission_id);
//! let state = session.wait_for_completion().await?;
//! println!("{:?}", state.final_score);
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::{Document, HttpSubmissionApi, WsTransport};
pub use config::{ConfigError, ReconnectPolicy, SessionConfig};
pub use connection::{
    CloseReason, ConnectionEvent, ConnectionEventKind, ConnectionHandle, ConnectionId,
    ConnectionManager, ConnectionSettings,
};
pub use domain::{Completion, Event, EventDecoder, FoldOutcome, Notice};
pub use error::{ApiError, SessionError, SessionResult};
pub use ports::{ReportGateway, Transport, TransportConnection, TransportFrame};
pub use service::{CallbackGuard, SubmissionSession};

pub use shared_bus::{SessionUpdate, Subscription, UpdateFilter, UpdateKind};
pub use shared_types::SessionState;
