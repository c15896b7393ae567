//! # Integrity Session Test Suite
//!
//! Workspace-level tests that run real WebSocket and HTTP traffic.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── server.rs          # axum mock of the submission service
//!     ├── frames.rs          # wire frames and report bodies
//!     ├── session_flows.rs   # SubmissionSession over WsTransport
//!     └── api_flows.rs       # HttpSubmissionApi against the REST endpoints
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p integrity-tests
//! cargo test -p integrity-tests integration::session_flows::
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
