//! # Connection Manager
//!
//! Owns the event connection of each submission. At most one live
//! connection exists per submission id; opening again while it is live
//! returns the existing handle.
//!
//! ```text
//! [IDLE] ──open──→ [CONNECTING] ──ready──→ [OPEN] ──close / error──→ [CLOSED]
//!                       ↑                     │
//!                       └──── reconnect ──────┘   (only with a ReconnectPolicy)
//! ```
//!
//! Everything the connection observes is reported as a [`ConnectionEvent`]
//! on the sink supplied to [`ConnectionManager::open`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{ConnectionStatus, SubmissionId, TransportError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::{ReconnectPolicy, SessionConfig};
use crate::ports::{Transport, TransportConnection, TransportFrame};

/// Process-unique identifier of one `open` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something a connection observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub connection_id: ConnectionId,
    pub kind: ConnectionEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEventKind {
    /// The transport is ready.
    Opened,
    /// A text frame arrived.
    Frame(String),
    /// The connection failed and will be retried after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The connection ended. No further events follow.
    Closed(CloseReason),
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the connection.
    Clean { code: Option<u16>, reason: String },
    /// The transport failed and no retry is left.
    Failed(TransportError),
}

/// Connection tuning, taken from [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub ws_base_url: String,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_timeout: Option<Duration>,
}

impl From<&SessionConfig> for ConnectionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ws_base_url: config.ws_base_url.clone(),
            connect_timeout: config.connect_timeout,
            reconnect: config.reconnect.clone(),
            heartbeat_timeout: config.heartbeat_timeout,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Handle to an opened connection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    submission_id: SubmissionId,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn submission_id(&self) -> &SubmissionId {
        &self.submission_id
    }

    /// Current status of the connection.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}

struct ConnectionEntry {
    handle: ConnectionHandle,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    shutdown_tx: oneshot::Sender<()>,
}

/// Connection table keyed by submission id.
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    settings: ConnectionSettings,
    connections: DashMap<SubmissionId, ConnectionEntry>,
    next_id: AtomicU64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, settings: ConnectionSettings) -> Self {
        Self {
            transport: Arc::new(transport),
            settings,
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stream URL for a submission.
    pub fn stream_url(&self, submission_id: &SubmissionId) -> String {
        format!(
            "{}/ws/submissions/{}",
            self.settings.ws_base_url.trim_end_matches('/'),
            submission_id
        )
    }

    /// Open the connection for a submission.
    ///
    /// The handle is `connecting` on return. If a live connection for the id
    /// already exists its handle is returned and `sink` is dropped.
    ///
    /// Must be called within a Tokio runtime.
    pub fn open(
        &self,
        submission_id: &SubmissionId,
        sink: mpsc::Sender<ConnectionEvent>,
    ) -> ConnectionHandle {
        // The shard lock is held from lookup to insert, so concurrent opens
        // for one id cannot both spawn a driver.
        let slot = match self.connections.entry(submission_id.clone()) {
            Entry::Occupied(existing) if existing.get().handle.status().is_live() => {
                let handle = existing.get().handle.clone();
                debug!(
                    submission_id = %submission_id,
                    connection_id = %handle.id,
                    "Connection already live, reusing"
                );
                return handle;
            }
            slot => slot,
        };

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let status_tx = Arc::new(status_tx);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = ConnectionHandle {
            id,
            submission_id: submission_id.clone(),
            status: status_rx,
        };

        let driver = ConnectionDriver {
            id,
            url: self.stream_url(submission_id),
            transport: Arc::clone(&self.transport),
            settings: self.settings.clone(),
            status_tx: Arc::clone(&status_tx),
            sink,
        };
        tokio::spawn(driver.run(shutdown_rx));

        info!(
            submission_id = %submission_id,
            connection_id = %id,
            "Opening event connection"
        );

        // A dead entry for the same id is replaced here.
        slot.insert(ConnectionEntry {
            handle: handle.clone(),
            status_tx,
            shutdown_tx,
        });

        handle
    }

    /// Close a connection. Closing twice, or closing a handle that was
    /// superseded or never live, does nothing.
    pub fn close(&self, handle: &ConnectionHandle) {
        let Some((_, entry)) = self
            .connections
            .remove_if(&handle.submission_id, |_, entry| entry.handle.id == handle.id)
        else {
            return;
        };

        // The driver may already have exited.
        let _ = entry.shutdown_tx.send(());
        entry.status_tx.send_replace(ConnectionStatus::Closed);

        debug!(
            submission_id = %handle.submission_id,
            connection_id = %handle.id,
            "Event connection closed by caller"
        );
    }

    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.handle.status().is_live())
            .count()
    }

    /// Entries in the table, live or not.
    #[cfg(test)]
    pub(crate) fn tracked_count(&self) -> usize {
        self.connections.len()
    }
}

/// Background task driving one connection until it ends.
struct ConnectionDriver<T: Transport> {
    id: ConnectionId,
    url: String,
    transport: Arc<T>,
    settings: ConnectionSettings,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    sink: mpsc::Sender<ConnectionEvent>,
}

/// The sink was dropped; nobody is listening any more.
struct SinkGone;

impl<T: Transport> ConnectionDriver<T> {
    async fn run(self, shutdown_rx: oneshot::Receiver<()>) {
        let outcome = tokio::select! {
            _ = shutdown_rx => None,
            outcome = self.drive() => Some(outcome),
        };

        self.status_tx.send_replace(ConnectionStatus::Closed);

        match outcome {
            Some(Ok(reason)) => {
                let _ = self.emit(ConnectionEventKind::Closed(reason)).await;
            }
            Some(Err(SinkGone)) => {
                debug!(connection_id = %self.id, "Event sink dropped, stopping connection");
            }
            None => {}
        }
    }

    /// Connect, pump frames, and retry per policy.
    async fn drive(&self) -> Result<CloseReason, SinkGone> {
        let policy = &self.settings.reconnect;
        let mut failures = 0u32;

        loop {
            let error = match self.run_once(&mut failures).await? {
                Ok(close) => return Ok(close),
                Err(error) => error,
            };

            if failures >= policy.max_attempts {
                warn!(
                    connection_id = %self.id,
                    url = %self.url,
                    error = %error,
                    "Event connection failed"
                );
                let error = if policy.is_enabled() {
                    TransportError::ReconnectExhausted { attempts: failures }
                } else {
                    error
                };
                return Ok(CloseReason::Failed(error));
            }

            let delay = policy.backoff_delay(failures);
            failures += 1;
            warn!(
                connection_id = %self.id,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Event connection failed, reconnecting"
            );

            self.status_tx.send_replace(ConnectionStatus::Connecting);
            self.emit(ConnectionEventKind::Reconnecting {
                attempt: failures,
                delay,
            })
            .await?;
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection attempt. Resets `failures` once the transport is ready.
    async fn run_once(
        &self,
        failures: &mut u32,
    ) -> Result<Result<CloseReason, TransportError>, SinkGone> {
        let connect = tokio::time::timeout(
            self.settings.connect_timeout,
            self.transport.connect(&self.url),
        )
        .await;

        let mut conn = match connect {
            Ok(Ok(conn)) => conn,
            Ok(Err(error)) => return Ok(Err(error)),
            Err(_) => {
                return Ok(Err(TransportError::ConnectTimeout {
                    url: self.url.clone(),
                    timeout: self.settings.connect_timeout,
                }))
            }
        };

        *failures = 0;
        self.status_tx.send_replace(ConnectionStatus::Open);
        debug!(connection_id = %self.id, url = %self.url, "Event connection open");
        if let Err(gone) = self.emit(ConnectionEventKind::Opened).await {
            conn.close().await;
            return Err(gone);
        }

        loop {
            match self.next_frame(conn.as_mut()).await {
                Ok(TransportFrame::Text(text)) => {
                    if let Err(gone) = self.emit(ConnectionEventKind::Frame(text)).await {
                        conn.close().await;
                        return Err(gone);
                    }
                }
                Ok(TransportFrame::Closed { code, reason }) => {
                    debug!(connection_id = %self.id, ?code, %reason, "Server closed connection");
                    return Ok(Ok(CloseReason::Clean { code, reason }));
                }
                Err(error) => {
                    conn.close().await;
                    return Ok(Err(error));
                }
            }
        }
    }

    async fn next_frame(
        &self,
        conn: &mut dyn TransportConnection,
    ) -> Result<TransportFrame, TransportError> {
        match self.settings.heartbeat_timeout {
            None => conn.next_frame().await,
            Some(silence) => tokio::time::timeout(silence, conn.next_frame())
                .await
                .map_err(|_| TransportError::HeartbeatTimeout { silence })?,
        }
    }

    async fn emit(&self, kind: ConnectionEventKind) -> Result<(), SinkGone> {
        self.sink
            .send(ConnectionEvent {
                connection_id: self.id,
                kind,
            })
            .await
            .map_err(|_| SinkGone)
    }
}
