//! # In-Process Analysis Server
//!
//! An axum server speaking the submission service protocol on an ephemeral
//! port: the analysis event stream, submission upload, status and report.
//!
//! ```text
//! GET  /ws/submissions/:id               → plays the scripted frames
//! POST /api/v1/submissions               → records the upload
//! GET  /api/v1/submissions/:id/status    → processing / completed
//! GET  /api/v1/submissions/:id/report    → configured report or 404
//! ```
//!
//! Each stream connection pops the next [`Script`] queued for its submission
//! id. Once a script runs out of steps the socket stays open until the
//! client leaves.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use submission_session::SessionConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// Submission id handed out by the upload endpoint.
pub const UPLOADED_SUBMISSION_ID: &str = "sub-uploaded";

/// One server action on the event stream.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pause(Duration),
    /// Close handshake with the given code and reason.
    Close { code: u16, reason: String },
    /// Drop the socket without a close frame.
    Drop,
}

/// Frames played to one stream connection.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(mut self, frame: Value) -> Self {
        self.steps.push(Step::Text(frame.to_string()));
        self
    }

    pub fn send_raw(mut self, text: &str) -> Self {
        self.steps.push(Step::Text(text.to_string()));
        self
    }

    pub fn send_binary(mut self, frame: Value) -> Self {
        self.steps.push(Step::Binary(frame.to_string().into_bytes()));
        self
    }

    pub fn ping(mut self) -> Self {
        self.steps.push(Step::Ping);
        self
    }

    pub fn pause(mut self, millis: u64) -> Self {
        self.steps.push(Step::Pause(Duration::from_millis(millis)));
        self
    }

    pub fn close(mut self, code: u16, reason: &str) -> Self {
        self.steps.push(Step::Close {
            code,
            reason: reason.to_string(),
        });
        self
    }

    pub fn drop_connection(mut self) -> Self {
        self.steps.push(Step::Drop);
        self
    }
}

/// What the upload endpoint received.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub size: usize,
    pub modules: Option<String>,
    pub assignment_id: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct ServerState {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    reports: Mutex<HashMap<String, (StatusCode, Value)>>,
    uploads: Mutex<Vec<Upload>>,
    required_token: Mutex<Option<String>>,
    stream_connects: AtomicUsize,
    client_closes: AtomicUsize,
    pongs: AtomicUsize,
    report_requests: AtomicUsize,
}

impl ServerState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &*self.required_token.lock() {
            None => true,
            Some(token) => headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == format!("Bearer {token}")),
        }
    }
}

/// Running mock of the submission service.
pub struct AnalysisServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl AnalysisServer {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(ServerState::default());

        let router = Router::new()
            .route("/ws/submissions/:id", get(stream))
            .route("/api/v1/submissions", post(create_submission))
            .route("/api/v1/submissions/:id/status", get(submission_status))
            .route("/api/v1/submissions/:id/report", get(submission_report))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                debug!(error = %e, "Analysis server stopped");
            }
        });

        Ok(Self { addr, state, task })
    }

    /// Session configuration pointing at this server.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            ws_base_url: format!("ws://{}", self.addr),
            api_base_url: format!("http://{}/api/v1", self.addr),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            ..SessionConfig::default()
        }
    }

    /// Queue a script for the next stream connection of `submission_id`.
    pub fn script(&self, submission_id: &str, script: Script) {
        self.state
            .scripts
            .lock()
            .entry(submission_id.to_string())
            .or_default()
            .push_back(script);
    }

    pub fn report(&self, submission_id: &str, body: Value) {
        self.report_with_status(submission_id, StatusCode::OK, body);
    }

    pub fn report_with_status(&self, submission_id: &str, status: StatusCode, body: Value) {
        self.state
            .reports
            .lock()
            .insert(submission_id.to_string(), (status, body));
    }

    /// Reject REST calls that do not carry this bearer token.
    pub fn require_token(&self, token: &str) {
        *self.state.required_token.lock() = Some(token.to_string());
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.uploads.lock().clone()
    }

    pub fn stream_connects(&self) -> usize {
        self.state.stream_connects.load(Ordering::SeqCst)
    }

    /// Stream connections the client closed or abandoned.
    pub fn client_closes(&self) -> usize {
        self.state.client_closes.load(Ordering::SeqCst)
    }

    pub fn pongs(&self) -> usize {
        self.state.pongs.load(Ordering::SeqCst)
    }

    pub fn report_requests(&self) -> usize {
        self.state.report_requests.load(Ordering::SeqCst)
    }
}

impl Drop for AnalysisServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn stream(
    ws: WebSocketUpgrade,
    Path(submission_id): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    state.stream_connects.fetch_add(1, Ordering::SeqCst);
    let script = state
        .scripts
        .lock()
        .get_mut(&submission_id)
        .and_then(VecDeque::pop_front)
        .unwrap_or_default();

    debug!(submission_id = %submission_id, steps = script.steps.len(), "Stream connected");
    ws.on_upgrade(move |socket| play(socket, script, state))
}

async fn play(mut socket: WebSocket, script: Script, state: Arc<ServerState>) {
    for step in script.steps {
        let sent = match step {
            Step::Text(text) => socket.send(Message::Text(text)).await,
            Step::Binary(bytes) => socket.send(Message::Binary(bytes)).await,
            Step::Ping => socket.send(Message::Ping(b"hb".to_vec())).await,
            Step::Pause(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Step::Close { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: Cow::Owned(reason),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
                // Let the client finish the handshake.
                while let Some(Ok(_)) = socket.recv().await {}
                return;
            }
            Step::Drop => return,
        };
        if sent.is_err() {
            state.client_closes.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Pong(_)) => {
                state.pongs.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    state.client_closes.fetch_add(1, Ordering::SeqCst);
}

async fn create_submission(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut upload = Upload {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ..Upload::default()
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            }
            Some("modules") => upload.modules = field.text().await.ok(),
            Some("assignment_id") => upload.assignment_id = field.text().await.ok(),
            _ => {}
        }
    }
    state.uploads.lock().push(upload);

    Json(json!({
        "submission_id": UPLOADED_SUBMISSION_ID,
        "status": "processing",
        "ws_url": format!("/ws/submissions/{UPLOADED_SUBMISSION_ID}"),
        "estimated_seconds": 45,
    }))
    .into_response()
}

async fn submission_status(
    Path(submission_id): Path<String>,
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let report = state.reports.lock().get(&submission_id).cloned();
    let body = match report {
        Some((status, report)) if status == StatusCode::OK => json!({
            "submission_id": submission_id,
            "status": "completed",
            "created_at": "2026-10-18T09:00:00Z",
            "completed_at": "2026-10-18T09:00:42Z",
            "integrity_score": report["integrity_score"],
            "risk_level": report["risk_level"],
        }),
        _ => json!({
            "submission_id": submission_id,
            "status": "processing",
            "created_at": "2026-10-18T09:00:00Z",
        }),
    };
    Json(body).into_response()
}

async fn submission_report(
    Path(submission_id): Path<String>,
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Response {
    state.report_requests.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&headers) {
        return unauthorized();
    }

    match state.reports.lock().get(&submission_id).cloned() {
        Some((status, body)) => (status, Json(body)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Report not found" })),
        )
            .into_response(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Not authenticated" })),
    )
        .into_response()
}
