//! # Shared Types Crate
//!
//! Domain entities, report shapes and the error taxonomy shared by every
//! crate that takes part in a submission session.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: risk thresholds live in exactly one function,
//!   [`score_to_risk`]; nothing else compares scores against 0.35 / 0.65.
//! - **Copy-out Snapshots**: [`SessionState`] is plain owned data. Consumers
//!   always receive their own clone.
//! - **Validated Identity**: a [`SubmissionId`] is checked once, at the
//!   boundary, and is URL-path safe afterwards.

pub mod entities;
pub mod errors;
pub mod report;

pub use entities::*;
pub use errors::*;
pub use report::*;
