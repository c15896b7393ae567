//! # Core Domain Entities
//!
//! The data model a submission session is built from.
//!
//! ## Clusters
//!
//! - **Identity**: `SubmissionId`, `ModuleId`
//! - **Results**: `ModuleResult`, `ModuleStatus`, `FinalScore`
//! - **Classification**: `RiskLevel` and the single `score_to_risk` classifier
//! - **Session**: `ConnectionStatus`, `SessionState`

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::InvalidIdentifier;
use crate::report::ReportSummary;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Opaque correlator between a client session and server-side analysis work.
///
/// Assigned once by the submission service and immutable for the lifetime
/// of the session. Only URL-path-safe characters are accepted because the id
/// is interpolated into the stream and report endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmissionId(String);

impl SubmissionId {
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InvalidIdentifier::Empty);
        }
        if raw.len() > Self::MAX_LEN {
            return Err(InvalidIdentifier::TooLong { len: raw.len() });
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(InvalidIdentifier::IllegalChar(c));
        }
        Ok(Self(raw))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SubmissionId {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SubmissionId {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubmissionId> for String {
    fn from(id: SubmissionId) -> Self {
        id.0
    }
}

/// Identifier of one analysis module. The set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    AiDetection,
    Plagiarism,
    WritingProfile,
    Proctoring,
}

impl ModuleId {
    /// Every module, in display order.
    pub const ALL: [ModuleId; 4] = [
        ModuleId::AiDetection,
        ModuleId::Plagiarism,
        ModuleId::WritingProfile,
        ModuleId::Proctoring,
    ];

    /// Modules selected when the caller does not choose any.
    pub const DEFAULT_SELECTION: [ModuleId; 3] = [
        ModuleId::AiDetection,
        ModuleId::Plagiarism,
        ModuleId::WritingProfile,
    ];

    /// Wire name of the module.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::AiDetection => "ai_detection",
            ModuleId::Plagiarism => "plagiarism",
            ModuleId::WritingProfile => "writing_profile",
            ModuleId::Proctoring => "proctoring",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ModuleId::AiDetection => "AI Detection",
            ModuleId::Plagiarism => "Plagiarism",
            ModuleId::WritingProfile => "Writing Profile",
            ModuleId::Proctoring => "Proctoring",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| InvalidIdentifier::UnknownModule(s.to_string()))
    }
}

// =============================================================================
// CLUSTER B: CLASSIFICATION
// =============================================================================

/// Scores strictly below this are `LOW`.
pub const LOW_RISK_CEILING: f64 = 0.35;

/// Scores strictly below this (and at least `LOW_RISK_CEILING`) are `MEDIUM`.
pub const MEDIUM_RISK_CEILING: f64 = 0.65;

/// Coarse risk classification of a [0,1] score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify a score. Equivalent to [`score_to_risk`].
    pub fn from_score(score: f64) -> Self {
        score_to_risk(score)
    }

    /// Wire name (`LOW`, `MEDIUM`, `HIGH`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts exactly the wire names, as the report body does.
impl FromStr for RiskLevel {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(InvalidIdentifier::UnknownRiskLevel(s.to_string())),
        }
    }
}

/// The one place the risk thresholds live.
///
/// `score < 0.35 → LOW`, `0.35 ≤ score < 0.65 → MEDIUM`, `score ≥ 0.65 → HIGH`.
pub fn score_to_risk(score: f64) -> RiskLevel {
    if score < LOW_RISK_CEILING {
        RiskLevel::Low
    } else if score < MEDIUM_RISK_CEILING {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

// =============================================================================
// CLUSTER C: RESULTS
// =============================================================================

/// Processing status reported for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleStatus {
    /// Module produced a score.
    Done,
    /// Module failed or timed out server-side.
    Error,
    /// Any status string this client does not model.
    Other(String),
}

impl ModuleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleStatus::Done => "done",
            ModuleStatus::Error => "error",
            ModuleStatus::Other(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ModuleStatus::Error)
    }
}

impl From<&str> for ModuleStatus {
    fn from(s: &str) -> Self {
        match s {
            "done" => ModuleStatus::Done,
            "error" => ModuleStatus::Error,
            other => ModuleStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ModuleStatus {
    fn from(s: String) -> Self {
        ModuleStatus::from(s.as_str())
    }
}

impl From<ModuleStatus> for String {
    fn from(status: ModuleStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one analysis module, keyed by `module_id` inside a session.
///
/// `weight` and `evidence` are not carried by the stream; they are filled in
/// from the report fetched after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub module_id: ModuleId,
    /// Risk score in [0,1].
    pub score: f64,
    /// Model confidence in [0,1].
    pub confidence: f64,
    pub status: ModuleStatus,
    pub processing_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
}

impl ModuleResult {
    /// Result as delivered by the stream, before any report merge.
    pub fn new(
        module_id: ModuleId,
        score: f64,
        confidence: f64,
        status: ModuleStatus,
        processing_ms: u64,
    ) -> Self {
        Self {
            module_id,
            score,
            confidence,
            status,
            processing_ms,
            weight: None,
            evidence: None,
        }
    }

    /// Risk classification of this module's score.
    pub fn risk(&self) -> RiskLevel {
        score_to_risk(self.score)
    }
}

/// The aggregate verdict. Set exactly once per session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub score: f64,
    pub risk: RiskLevel,
}

impl FinalScore {
    pub fn new(score: f64, risk: RiskLevel) -> Self {
        Self { score, risk }
    }

    /// Final score whose risk is derived from the score.
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            risk: score_to_risk(score),
        }
    }
}

// =============================================================================
// CLUSTER D: SESSION
// =============================================================================

/// Lifecycle of the event connection as seen by the session.
///
/// ```text
/// [IDLE] ──open──→ [CONNECTING] ──ready──→ [OPEN] ──completed / close──→ [CLOSED]
///                        │                                                   ↑
///                        └──────────────── transport failure ────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
        }
    }

    /// Whether a connection in this status may still deliver frames.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Open)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one submission's real-time analysis progress.
///
/// INVARIANTS:
/// - `results` never loses a key within a session
/// - `final_score` is `None` until `completed`, then immutable
/// - `completed` never reverts except through a reset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub connection_status: ConnectionStatus,
    pub results: BTreeMap<ModuleId, ModuleResult>,
    pub completed: bool,
    pub final_score: Option<FinalScore>,
    /// Report details merged after completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportSummary>,
}

impl SessionState {
    /// Canonical empty state.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Result for a module, if one has arrived.
    pub fn result(&self, module_id: ModuleId) -> Option<&ModuleResult> {
        self.results.get(&module_id)
    }

    /// Closed without a verdict.
    pub fn is_failed(&self) -> bool {
        self.connection_status == ConnectionStatus::Closed && !self.completed
    }

    /// Whether the post-completion report has been merged.
    pub fn has_report(&self) -> bool {
        self.report.is_some()
    }
}
