//! Command implementations.

use std::future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use integrity_telemetry::submission_span;
use shared_types::{ModuleId, SessionState, SubmissionId, SubmissionReceipt};
use submission_session::{
    Document, HttpSubmissionApi, SessionConfig, SessionUpdate, SubmissionSession, WsTransport,
};
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn, Instrument};

use crate::render;

/// Session wired to the real transport and API.
pub type LiveSession = SubmissionSession<WsTransport, HttpSubmissionApi>;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// Connection settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub ws_url: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
}

/// File, then environment, then command line.
pub fn resolve_config(overrides: &Overrides) -> Result<SessionConfig> {
    let config = match &overrides.config {
        Some(path) => SessionConfig::load(path)?.with_env_overrides()?,
        None => SessionConfig::from_env()?,
    };
    apply_overrides(config, overrides)
}

fn apply_overrides(mut config: SessionConfig, overrides: &Overrides) -> Result<SessionConfig> {
    if let Some(url) = &overrides.ws_url {
        config.ws_base_url = url.clone();
    }
    if let Some(url) = &overrides.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(token) = &overrides.token {
        config.auth_token = Some(token.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Upload a document and optionally follow its analysis.
pub async fn submit(
    config: SessionConfig,
    path: &Path,
    modules: Vec<ModuleId>,
    assignment_id: Option<String>,
    follow_stream: bool,
    output: Output,
) -> Result<()> {
    let modules = if modules.is_empty() {
        ModuleId::DEFAULT_SELECTION.to_vec()
    } else {
        modules
    };

    let api = HttpSubmissionApi::new(config.clone());
    let document = Document::from_path(path).await?;
    let receipt = api
        .create_submission(document, &modules, assignment_id.as_deref())
        .await
        .context("submission was rejected")?;

    info!(submission_id = %receipt.submission_id, status = %receipt.status, "Submission created");
    if output == Output::Text {
        println!("Submission {}", receipt.submission_id);
        if let Some(seconds) = receipt.estimated_seconds {
            println!("Estimated analysis time: {seconds}s");
        }
    }

    match after_upload(&receipt, follow_stream) {
        AfterUpload::PrintReceipt => {
            if output == Output::Json {
                println!("{}", serde_json::to_string(&receipt)?);
            }
            Ok(())
        }
        AfterUpload::FetchReport => {
            info!(submission_id = %receipt.submission_id, "Document already analysed, fetching report");
            if output == Output::Text {
                println!("Already analysed, fetching the existing report");
            }
            report(config, receipt.submission_id, output).await
        }
        AfterUpload::Follow => {
            let grace = report_grace(&config);
            let session = SubmissionSession::new(config, WsTransport::new(), api)?;
            follow_in_span(&session, receipt.submission_id, grace, output).await?;
            Ok(())
        }
    }
}

/// What `submit` does once the upload is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterUpload {
    PrintReceipt,
    /// The service streams nothing for a cached document.
    FetchReport,
    Follow,
}

fn after_upload(receipt: &SubmissionReceipt, follow_stream: bool) -> AfterUpload {
    if !follow_stream {
        AfterUpload::PrintReceipt
    } else if receipt.is_cached() {
        AfterUpload::FetchReport
    } else {
        AfterUpload::Follow
    }
}

/// Follow an existing submission.
pub async fn watch(config: SessionConfig, submission_id: SubmissionId, output: Output) -> Result<()> {
    let grace = report_grace(&config);
    let api = HttpSubmissionApi::new(config.clone());
    let session = SubmissionSession::new(config, WsTransport::new(), api)?;
    follow_in_span(&session, submission_id, grace, output).await?;
    Ok(())
}

/// Print the final report of a completed submission.
pub async fn report(config: SessionConfig, submission_id: SubmissionId, output: Output) -> Result<()> {
    let api = HttpSubmissionApi::new(config);
    let report = api
        .fetch_report(&submission_id)
        .await
        .with_context(|| format!("could not fetch report for {submission_id}"))?;

    match output {
        Output::Text => print!("{}", render::report_text(&report)),
        Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Print the processing status of a submission.
pub async fn status(config: SessionConfig, submission_id: SubmissionId, output: Output) -> Result<()> {
    let api = HttpSubmissionApi::new(config);
    let status = api.get_status(&submission_id).await?;

    match output {
        Output::Text => {
            println!("Submission {}: {}", status.submission_id, status.status);
            if let (Some(score), Some(risk)) = (status.integrity_score, status.risk_level) {
                println!("Integrity score {score:.2}: {risk} risk");
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}

async fn follow_in_span(
    session: &LiveSession,
    submission_id: SubmissionId,
    report_grace: Duration,
    output: Output,
) -> Result<SessionState> {
    let span = submission_span!("follow", submission_id = %submission_id);
    follow(session, submission_id, report_grace, output)
        .instrument(span)
        .await
}

/// Stream a session to stdout until the verdict and report are in.
///
/// A failed report fetch is reported but does not fail the command: the
/// streamed verdict stands on its own.
pub async fn follow(
    session: &LiveSession,
    submission_id: SubmissionId,
    report_grace: Duration,
    output: Output,
) -> Result<SessionState> {
    // Subscribe first so the initial snapshot is not missed.
    let mut subscription = session.subscribe();
    session.start(submission_id.clone());

    let mut previous = SessionState::idle();
    let mut report_deadline: Option<Instant> = None;

    loop {
        let deadline = async move {
            match report_deadline {
                Some(at) => sleep_until(at).await,
                None => future::pending::<()>().await,
            }
        };

        let update = tokio::select! {
            update = subscription.recv() => update,
            _ = deadline => {
                warn!(submission_id = %submission_id, "Report did not arrive in time");
                return Ok(previous);
            }
            _ = tokio::signal::ctrl_c() => {
                session.reset();
                bail!("interrupted");
            }
        };

        let Some(update) = update else {
            bail!("session for {submission_id} ended unexpectedly");
        };

        match update {
            SessionUpdate::Snapshot(state) => {
                emit(&previous, &state, output)?;
                if state.completed && state.has_report() {
                    return Ok(state);
                }
                if state.completed && report_deadline.is_none() {
                    report_deadline = Some(Instant::now() + report_grace);
                }
                previous = state;
            }
            SessionUpdate::TransportError { error, .. } => {
                return Err(anyhow!(error).context("event stream failed"));
            }
            SessionUpdate::ReportFetchError { error, .. } => {
                warn!(submission_id = %submission_id, error = %error, "Report unavailable");
                if output == Output::Text {
                    eprintln!("Report unavailable: {error}");
                }
                return Ok(previous);
            }
        }
    }
}

/// How long to wait for the report once the verdict is in.
fn report_grace(config: &SessionConfig) -> Duration {
    config.request_timeout + Duration::from_secs(5)
}

fn emit(previous: &SessionState, next: &SessionState, output: Output) -> Result<()> {
    match output {
        Output::Text => {
            for line in render::progress_lines(previous, next) {
                println!("{line}");
            }
        }
        Output::Json => println!("{}", serde_json::to_string(next)?),
    }
    Ok(())
}
