//! In-memory port implementations for deterministic tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{IntegrityReport, ReportFetchError, SubmissionId, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use crate::ports::{ReportGateway, Transport, TransportConnection, TransportFrame};

type FrameResult = Result<TransportFrame, TransportError>;

/// Transport whose connections are driven by the test through [`MockPeer`]s.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

struct MockTransportInner {
    peers: mpsc::UnboundedSender<MockPeer>,
    failures: Mutex<VecDeque<String>>,
    connects: AtomicUsize,
}

impl MockTransport {
    /// The receiver yields one peer per successful connect.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inner: Arc::new(MockTransportInner {
                peers,
                failures: Mutex::new(VecDeque::new()),
                connects: AtomicUsize::new(0),
            }),
        };
        (transport, rx)
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self, reason: &str) {
        self.inner.failures.lock().push_back(reason.to_string());
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportConnection>, TransportError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.inner.failures.lock().pop_front() {
            return Err(TransportError::ConnectFailed {
                url: url.to_string(),
                reason,
            });
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.inner.peers.send(MockPeer {
            url: url.to_string(),
            frames: frames_tx,
            closed: Arc::clone(&closed),
        });

        Ok(Box::new(MockConnection {
            frames: frames_rx,
            closed,
        }))
    }
}

/// Server side of a mock connection. Dropping it closes cleanly.
pub struct MockPeer {
    pub url: String,
    frames: mpsc::UnboundedSender<FrameResult>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn send_text(&self, text: &str) {
        let _ = self.frames.send(Ok(TransportFrame::Text(text.to_string())));
    }

    pub fn close(&self, code: Option<u16>, reason: &str) {
        let _ = self.frames.send(Ok(TransportFrame::Closed {
            code,
            reason: reason.to_string(),
        }));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.frames.send(Err(TransportError::ConnectionLost {
            reason: reason.to_string(),
        }));
    }

    /// Whether the client side closed or dropped the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.frames.is_closed()
    }
}

struct MockConnection {
    frames: mpsc::UnboundedReceiver<FrameResult>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl TransportConnection for MockConnection {
    async fn next_frame(&mut self) -> FrameResult {
        match self.frames.recv().await {
            Some(frame) => frame,
            None => Ok(TransportFrame::Closed {
                code: None,
                reason: String::new(),
            }),
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Report gateway with a canned answer and an optional gate.
pub struct MockGateway {
    response: Mutex<Result<IntegrityReport, ReportFetchError>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl MockGateway {
    pub fn returning(response: Result<IntegrityReport, ReportFetchError>) -> Self {
        Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Hold every fetch until the returned `Notify` is signalled.
    pub fn gated(response: Result<IntegrityReport, ReportFetchError>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let gateway = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::returning(response)
        };
        (gateway, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportGateway for MockGateway {
    async fn fetch_report(
        &self,
        _submission_id: &SubmissionId,
    ) -> Result<IntegrityReport, ReportFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.response.lock().clone()
    }
}
