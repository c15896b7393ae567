//! HTTP client for the submission service.
//!
//! Covers the three endpoints a session needs around its stream: creating a
//! submission, polling its status, and fetching the final report.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared_types::{
    IntegrityReport, ModuleId, ReportFetchError, SubmissionId, SubmissionReceipt,
    SubmissionStatus,
};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::ports::ReportGateway;

/// File extensions the submission service accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["txt", "docx", "pdf", "md"];

/// Largest document the submission service accepts.
pub const MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;

/// A document ready for upload.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a document from disk.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(file_name, bytes))
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Apply the upload rules of the submission service.
    pub fn validate(&self) -> Result<(), ApiError> {
        match self.extension() {
            Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(ApiError::InvalidSubmission(format!(
                    "unsupported file type: {} (accepted: {})",
                    self.file_name,
                    ACCEPTED_EXTENSIONS.join(", ")
                )))
            }
        }
        if self.bytes.is_empty() {
            return Err(ApiError::InvalidSubmission("document is empty".into()));
        }
        if self.bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(ApiError::InvalidSubmission(format!(
                "document is {} bytes, limit is {}",
                self.bytes.len(),
                MAX_DOCUMENT_BYTES
            )));
        }
        Ok(())
    }
}

/// reqwest-backed client for `/submissions`.
#[derive(Debug, Clone)]
pub struct HttpSubmissionApi {
    client: Client,
    config: SessionConfig,
}

impl HttpSubmissionApi {
    pub fn new(config: SessionConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    /// Upload a document for analysis.
    pub async fn create_submission(
        &self,
        document: Document,
        modules: &[ModuleId],
        assignment_id: Option<&str>,
    ) -> Result<SubmissionReceipt, ApiError> {
        document.validate()?;
        if modules.is_empty() {
            return Err(ApiError::InvalidSubmission(
                "select at least one analysis module".into(),
            ));
        }

        let modules = modules
            .iter()
            .map(ModuleId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let size = document.bytes.len();
        let part = Part::bytes(document.bytes).file_name(document.file_name.clone());
        let mut form = Form::new().part("file", part).text("modules", modules.clone());
        if let Some(assignment_id) = assignment_id.filter(|a| !a.is_empty()) {
            form = form.text("assignment_id", assignment_id.to_string());
        }

        debug!(file = %document.file_name, size, modules = %modules, "Creating submission");

        let request = self
            .client
            .post(self.config.api_url("submissions"))
            .multipart(form);
        self.send(request).await
    }

    /// Current processing status.
    pub async fn get_status(&self, submission_id: &SubmissionId) -> Result<SubmissionStatus, ApiError> {
        let url = self
            .config
            .api_url(&format!("submissions/{submission_id}/status"));
        self.send(self.client.get(url)).await
    }

    /// Full report of a completed submission.
    pub async fn fetch_report(&self, submission_id: &SubmissionId) -> Result<IntegrityReport, ApiError> {
        let url = self
            .config
            .api_url(&format!("submissions/{submission_id}/report"));
        self.send(self.client.get(url)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ApiError::Connection(e.to_string())
            } else {
                ApiError::Http(e)
            }
        })?;

        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("Submission service rejected credentials");
                return Err(ApiError::Unauthorized);
            }
            StatusCode::NOT_FOUND => return Err(ApiError::NotFound),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    status: s.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ReportGateway for HttpSubmissionApi {
    async fn fetch_report(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<IntegrityReport, ReportFetchError> {
        HttpSubmissionApi::fetch_report(self, submission_id)
            .await
            .map_err(ReportFetchError::from)
    }
}
