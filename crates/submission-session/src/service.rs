//! # Submission Session
//!
//! Wires a connection's frames through the decoder into the aggregator and
//! publishes every resulting snapshot.
//!
//! ```text
//! [IDLE] ──start──→ [CONNECTING] ──ready──→ [OPEN] ──module_complete*──→ [OPEN]
//!    ↑                    │                    │
//!    │                    │                    ├──completed──→ [CLOSED ok] ──→ report fetch
//!    │                    └──── transport error / early close ──→ [CLOSED failed]
//!    └──────────────────────────── reset (from any state) ────────────────────────┘
//! ```
//!
//! ## Generations
//!
//! Every `start` and `reset` bumps a generation counter. Background work
//! (the frame pump and the report fetch) carries the generation it was
//! started under and is discarded if the session moved on in the meantime.
//!
//! ## Locking
//!
//! State lives behind one `parking_lot::Mutex`, never held across an await.
//! Updates are published while the lock is held, so subscribers observe
//! snapshots in the order the state changed.

use parking_lot::{Mutex, MutexGuard};
use shared_bus::{InMemoryUpdateBus, SessionUpdate, Subscription, UpdateFilter, UpdatePublisher};
use shared_types::{
    ConnectionStatus, IntegrityReport, ReportFetchError, SessionState, SubmissionId,
    TransportError,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, SessionConfig};
use crate::connection::{
    CloseReason, ConnectionEvent, ConnectionEventKind, ConnectionHandle, ConnectionId,
    ConnectionManager, ConnectionSettings,
};
use crate::domain::{aggregator, Event, EventDecoder, FoldOutcome, Notice};
use crate::error::{SessionError, SessionResult};
use crate::ports::{ReportGateway, Transport};

/// Real-time session for one submission at a time.
///
/// Dropping the session closes its connection and cancels background work.
pub struct SubmissionSession<T: Transport, G: ReportGateway> {
    inner: Arc<SessionInner<T, G>>,
}

struct SessionInner<T: Transport, G: ReportGateway> {
    config: SessionConfig,
    connections: ConnectionManager<T>,
    gateway: Arc<G>,
    bus: InMemoryUpdateBus,
    core: Mutex<SessionCore>,
}

#[derive(Default)]
struct SessionCore {
    generation: u64,
    submission_id: Option<SubmissionId>,
    state: SessionState,
    connection: Option<ConnectionHandle>,
    pump: Option<JoinHandle<()>>,
    fetch: Option<JoinHandle<()>>,
    /// The server announced it stopped waiting for results.
    server_timed_out: bool,
    failure: Option<TransportError>,
}

impl<T: Transport, G: ReportGateway> SubmissionSession<T, G> {
    /// Build a session over the given adapters.
    ///
    /// The configuration is validated here, so a session never runs with
    /// zero-sized channels or unusable URLs.
    pub fn new(config: SessionConfig, transport: T, gateway: G) -> Result<Self, ConfigError> {
        config.validate()?;
        let connections = ConnectionManager::new(transport, ConnectionSettings::from(&config));
        let bus = InMemoryUpdateBus::with_capacity(config.update_buffer);

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                connections,
                gateway: Arc::new(gateway),
                bus,
                core: Mutex::new(SessionCore::default()),
            }),
        })
    }

    /// Begin tracking a submission.
    ///
    /// Starting the submission that is already active does nothing. Starting
    /// a different one discards the current session first.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self, submission_id: SubmissionId) {
        let inner = &self.inner;
        let mut core = inner.core.lock();

        if core.submission_id.as_ref() == Some(&submission_id) {
            debug!(submission_id = %submission_id, "Submission already active");
            return;
        }
        if core.submission_id.is_some() {
            inner.reset_locked(&mut core);
        }

        core.generation += 1;
        let generation = core.generation;

        let (tx, rx) = mpsc::channel(inner.config.event_buffer);
        let handle = inner.connections.open(&submission_id, tx);

        info!(
            submission_id = %submission_id,
            connection_id = %handle.id(),
            generation,
            "Session started"
        );

        core.state = SessionState {
            connection_status: ConnectionStatus::Connecting,
            ..SessionState::idle()
        };
        core.pump = Some(tokio::spawn(SessionInner::pump(
            Arc::clone(inner),
            generation,
            handle.id(),
            rx,
        )));
        core.connection = Some(handle);
        core.submission_id = Some(submission_id);

        inner.publish_snapshot(&core);
    }

    /// Close any live connection and return to `idle`.
    ///
    /// Safe to call from any state and any number of times.
    pub fn reset(&self) {
        let mut core = self.inner.core.lock();
        self.inner.reset_locked(&mut core);
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.core.lock().state.clone()
    }

    /// The active submission, if any.
    pub fn submission_id(&self) -> Option<SubmissionId> {
        self.inner.core.lock().submission_id.clone()
    }

    /// Receive every update published from now on.
    ///
    /// Use [`snapshot`](Self::snapshot) for the current state.
    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe(UpdateFilter::all())
    }

    /// Receive only the update kinds the filter selects.
    pub fn subscribe_filtered(&self, filter: UpdateFilter) -> Subscription {
        self.inner.bus.subscribe(filter)
    }

    /// Invoke `callback` with every update until the guard is dropped.
    ///
    /// Must be called within a Tokio runtime.
    pub fn on_update<F>(&self, mut callback: F) -> CallbackGuard
    where
        F: FnMut(SessionUpdate) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(update) = subscription.recv().await {
                callback(update);
            }
        });
        CallbackGuard { task }
    }

    /// Wait until the active submission completes or fails.
    ///
    /// Resolves with the snapshot at completion, before any report merge.
    pub async fn wait_for_completion(&self) -> SessionResult<SessionState> {
        let mut subscription = self.subscribe();
        {
            let core = self.inner.core.lock();
            if core.submission_id.is_none() {
                return Err(SessionError::NotStarted);
            }
            if core.state.completed {
                return Ok(core.state.clone());
            }
            if let Some(failure) = &core.failure {
                return Err(failure.clone().into());
            }
        }

        while let Some(update) = subscription.recv().await {
            match update {
                SessionUpdate::Snapshot(state) if state.completed => return Ok(state),
                SessionUpdate::Snapshot(state)
                    if state.connection_status == ConnectionStatus::Idle =>
                {
                    return Err(SessionError::Reset)
                }
                SessionUpdate::TransportError { error, .. } => return Err(error.into()),
                _ => {}
            }
        }
        Err(SessionError::Reset)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }
}

impl<T: Transport, G: ReportGateway> Drop for SubmissionSession<T, G> {
    fn drop(&mut self) {
        let mut core = self.inner.core.lock();
        self.inner.reset_locked(&mut core);
    }
}

impl<T: Transport, G: ReportGateway> SessionInner<T, G> {
    fn reset_locked(&self, core: &mut SessionCore) {
        let was_idle = core.submission_id.is_none() && core.state == SessionState::idle();

        core.generation += 1;
        if let Some(handle) = core.connection.take() {
            self.connections.close(&handle);
        }
        if let Some(pump) = core.pump.take() {
            pump.abort();
        }
        if let Some(fetch) = core.fetch.take() {
            fetch.abort();
        }
        let previous = core.submission_id.take();
        core.server_timed_out = false;
        core.failure = None;
        core.state = aggregator::reset();

        if !was_idle {
            info!(
                submission_id = ?previous.as_ref().map(SubmissionId::as_str),
                generation = core.generation,
                "Session reset"
            );
            self.publish_snapshot(core);
        }
    }

    fn publish_snapshot(&self, core: &SessionCore) {
        self.bus.publish(SessionUpdate::Snapshot(core.state.clone()));
    }

    /// Lock the core if `generation` is still current.
    fn current(&self, generation: u64) -> Option<MutexGuard<'_, SessionCore>> {
        let core = self.core.lock();
        if core.generation == generation {
            Some(core)
        } else {
            trace!(generation, current = core.generation, "Discarding stale work");
            None
        }
    }

    /// Drain one connection's events into the session.
    async fn pump(
        self: Arc<Self>,
        generation: u64,
        connection_id: ConnectionId,
        mut events: mpsc::Receiver<ConnectionEvent>,
    ) {
        let decoder = EventDecoder::new();

        while let Some(event) = events.recv().await {
            if event.connection_id != connection_id {
                continue;
            }

            match event.kind {
                ConnectionEventKind::Opened => {
                    self.set_status(generation, ConnectionStatus::Open);
                }
                ConnectionEventKind::Reconnecting { attempt, delay } => {
                    info!(
                        connection_id = %connection_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting event stream"
                    );
                    self.set_status(generation, ConnectionStatus::Connecting);
                }
                ConnectionEventKind::Frame(text) => {
                    let Some(event) = decoder.decode(&text) else {
                        continue;
                    };
                    if !Arc::clone(&self).handle_event(generation, event) {
                        return;
                    }
                }
                ConnectionEventKind::Closed(reason) => {
                    self.connection_closed(generation, reason);
                    return;
                }
            }
        }
    }

    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        let Some(mut core) = self.current(generation) else {
            return;
        };
        if core.state.completed || core.state.connection_status == status {
            return;
        }
        core.state.connection_status = status;
        self.publish_snapshot(&core);
    }

    /// Fold one decoded event. Returns `false` once the pump should stop.
    fn handle_event(self: Arc<Self>, generation: u64, event: Event) -> bool {
        let Some(mut core) = self.current(generation) else {
            return false;
        };
        let submission_id = core
            .submission_id
            .as_ref()
            .map(|id| id.as_str().to_owned())
            .unwrap_or_default();

        match &event {
            Event::Notice(Notice::Timeout) => {
                warn!(submission_id = %submission_id, "Server timed out waiting for analysis events");
                core.server_timed_out = true;
            }
            Event::Notice(Notice::ServerError(message)) => {
                warn!(submission_id = %submission_id, error = %message, "Server reported an error");
            }
            Event::Notice(Notice::AnalysisStarted) => {
                debug!(submission_id = %submission_id, "Analysis started");
            }
            _ => {}
        }

        let state = std::mem::take(&mut core.state);
        let (state, outcome) = aggregator::apply(state, &event);
        core.state = state;

        match outcome {
            FoldOutcome::Applied => {
                self.publish_snapshot(&core);
            }
            FoldOutcome::RejectedAfterCompletion => {
                warn!(
                    submission_id = %submission_id,
                    event_type = event.type_name(),
                    module_id = ?event.module_id(),
                    "Rejecting event after completion"
                );
                return true;
            }
            FoldOutcome::Ignored => return true,
        }

        match &event {
            Event::ModuleComplete(result) => {
                debug!(
                    submission_id = %submission_id,
                    module_id = %result.module_id,
                    score = result.score,
                    status = %result.status,
                    "Module result folded"
                );
                true
            }
            Event::Completed(completion) => {
                info!(
                    submission_id = %submission_id,
                    score = completion.final_score.score,
                    risk = %completion.final_score.risk,
                    error = ?completion.error,
                    "Analysis completed"
                );
                if let Some(handle) = core.connection.take() {
                    self.connections.close(&handle);
                }
                if let Some(id) = core.submission_id.clone() {
                    core.fetch = Some(tokio::spawn(Arc::clone(&self).fetch_report(generation, id)));
                }
                false
            }
            Event::Notice(_) => true,
        }
    }

    fn connection_closed(&self, generation: u64, reason: CloseReason) {
        let Some(mut core) = self.current(generation) else {
            return;
        };
        if let Some(handle) = core.connection.take() {
            self.connections.close(&handle);
        }
        if core.state.completed {
            return;
        }

        let error = match reason {
            CloseReason::Clean { .. } if core.server_timed_out => TransportError::ServerTimeout,
            CloseReason::Clean { code, reason } => {
                TransportError::ClosedBeforeCompletion { code, reason }
            }
            CloseReason::Failed(error) => error,
        };
        let Some(submission_id) = core.submission_id.clone() else {
            return;
        };

        warn!(submission_id = %submission_id, error = %error, "Session failed");

        core.state.connection_status = ConnectionStatus::Closed;
        core.failure = Some(error.clone());
        self.publish_snapshot(&core);
        self.bus.publish(SessionUpdate::TransportError {
            submission_id,
            error,
        });
    }

    async fn fetch_report(self: Arc<Self>, generation: u64, submission_id: SubmissionId) {
        debug!(submission_id = %submission_id, "Fetching report");
        let result = self.gateway.fetch_report(&submission_id).await;
        self.report_fetched(generation, submission_id, result);
    }

    fn report_fetched(
        &self,
        generation: u64,
        submission_id: SubmissionId,
        result: Result<IntegrityReport, ReportFetchError>,
    ) {
        let Some(mut core) = self.current(generation) else {
            return;
        };
        core.fetch = None;

        let result = result.and_then(|report| {
            if report.submission_id == submission_id {
                Ok(report)
            } else {
                Err(ReportFetchError::Parse(format!(
                    "report belongs to submission {}",
                    report.submission_id
                )))
            }
        });

        match result {
            Ok(report) => {
                if !report.risk_is_consistent() {
                    debug!(
                        submission_id = %submission_id,
                        score = report.integrity_score,
                        risk = %report.risk_level,
                        "Report risk level disagrees with score thresholds"
                    );
                }
                let state = std::mem::take(&mut core.state);
                core.state = aggregator::merge_report(state, &report);
                info!(submission_id = %submission_id, "Report merged");
                self.publish_snapshot(&core);
            }
            Err(error) => {
                warn!(submission_id = %submission_id, error = %error, "Report fetch failed");
                self.bus.publish(SessionUpdate::ReportFetchError {
                    submission_id,
                    error,
                });
            }
        }
    }
}

/// Keeps an [`on_update`](SubmissionSession::on_update) callback running.
#[must_use = "dropping the guard stops the callback"]
pub struct CallbackGuard {
    task: JoinHandle<()>,
}

impl CallbackGuard {
    /// Stop invoking the callback.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for CallbackGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}
