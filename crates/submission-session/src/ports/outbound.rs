//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The session depends on two collaborators: a duplex transport carrying the
//! analysis event stream, and the report endpoint queried once after
//! completion.

use async_trait::async_trait;
use shared_types::{IntegrityReport, ReportFetchError, SubmissionId, TransportError};
use std::sync::Arc;

/// One inbound item from an established connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    /// A text frame (or a binary frame that was valid UTF-8).
    Text(String),
    /// The peer closed the connection cleanly.
    Closed { code: Option<u16>, reason: String },
}

/// Opens duplex connections to the analysis event stream.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection. Resolves once the connection is ready for reading.
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportConnection>, TransportError>;
}

/// An established connection.
#[async_trait]
pub trait TransportConnection: Send {
    /// Wait for the next frame.
    ///
    /// Control frames are handled inside the connection and never returned.
    /// After `Closed` or an error the connection must not be read again.
    async fn next_frame(&mut self) -> Result<TransportFrame, TransportError>;

    /// Close from our side. Errors are swallowed.
    async fn close(&mut self);
}

/// Retrieves the full report for a completed submission.
#[async_trait]
pub trait ReportGateway: Send + Sync + 'static {
    async fn fetch_report(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<IntegrityReport, ReportFetchError>;
}

#[async_trait]
impl<T: Transport> Transport for Arc<T> {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportConnection>, TransportError> {
        (**self).connect(url).await
    }
}

#[async_trait]
impl<G: ReportGateway> ReportGateway for Arc<G> {
    async fn fetch_report(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<IntegrityReport, ReportFetchError> {
        (**self).fetch_report(submission_id).await
    }
}
