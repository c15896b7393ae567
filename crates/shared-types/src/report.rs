//! # Report and Submission Shapes
//!
//! Request/response bodies of the submission and report endpoints. These are
//! boundary contracts with the analysis service; the session only consumes
//! them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{score_to_risk, ModuleId, RiskLevel, SubmissionId};

/// Response of the submission creation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub submission_id: SubmissionId,
    /// `processing`, or `cached` when an identical document was already analysed.
    pub status: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub estimated_seconds: Option<u32>,
}

impl SubmissionReceipt {
    /// The server already holds a finished report for this document.
    pub fn is_cached(&self) -> bool {
        self.status == "cached"
    }
}

/// Response of the submission status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub submission_id: SubmissionId,
    pub status: String,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub integrity_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

/// Per-module breakdown inside a full report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportModule {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub weighted_contribution: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence: Option<serde_json::Value>,
    #[serde(default)]
    pub processing_ms: Option<f64>,
}

/// High-signal module flagged by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub module: String,
    pub score: f64,
    pub severity: RiskLevel,
}

impl RiskFlag {
    /// Module the flag refers to, when it is one this client knows.
    pub fn module_id(&self) -> Option<ModuleId> {
        self.module.parse().ok()
    }
}

/// Full integrity report, fetched once after the stream completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub submission_id: SubmissionId,
    pub integrity_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub flags: Vec<RiskFlag>,
    #[serde(default)]
    pub modules: HashMap<String, ReportModule>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub pdf_download_url: Option<String>,
}

impl IntegrityReport {
    /// Breakdown for a module.
    pub fn module(&self, module_id: ModuleId) -> Option<&ReportModule> {
        self.modules.get(module_id.as_str())
    }

    /// Whether the reported risk level agrees with the shared thresholds.
    pub fn risk_is_consistent(&self) -> bool {
        score_to_risk(self.integrity_score) == self.risk_level
    }
}

/// Report-level fields attached to a session snapshot after completion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub confidence: Option<f64>,
    pub recommendation: Option<String>,
    pub flags: Vec<RiskFlag>,
    pub pdf_download_url: Option<String>,
}

impl From<&IntegrityReport> for ReportSummary {
    fn from(report: &IntegrityReport) -> Self {
        Self {
            confidence: report.confidence,
            recommendation: report.recommendation.clone(),
            flags: report.flags.clone(),
            pdf_download_url: report.pdf_download_url.clone(),
        }
    }
}
