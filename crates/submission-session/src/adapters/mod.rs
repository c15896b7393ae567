//! Adapters implementing the outbound ports.

pub mod http_api;
pub mod ws_transport;

pub use http_api::{Document, HttpSubmissionApi, ACCEPTED_EXTENSIONS, MAX_DOCUMENT_BYTES};
pub use ws_transport::WsTransport;
