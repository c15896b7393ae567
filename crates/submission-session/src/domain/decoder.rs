//! # Event Decoder
//!
//! Turns one raw text frame into a typed [`Event`], or rejects it.
//!
//! Rejection is silent from the session's point of view: `decode` returns
//! `None` and logs the reason. A corrupt frame never ends a session.
//!
//! ```text
//! raw text ──parse──→ JSON value ──tag──→ WireEvent ──validate──→ Event
//!              │                   │                    │
//!              └── NotJson         ├── Malformed        ├── MissingField
//!                                  └── UnknownType      ├── OutOfRange
//!                                                       ├── UnknownModule
//!                                                       └── InvalidRiskLevel
//! ```

use serde::Deserialize;
use serde_json::Value;
use shared_types::{
    score_to_risk, DecodeError, FinalScore, ModuleId, ModuleResult, ModuleStatus, RiskLevel,
};
use tracing::debug;

use super::events::{Completion, Event, Notice};

/// Frame shapes as they appear on the wire. Extra fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    ModuleComplete {
        #[serde(default)]
        module_id: Option<String>,
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        processing_ms: Option<f64>,
    },
    Completed {
        #[serde(default)]
        integrity_score: Option<f64>,
        #[serde(default)]
        risk_level: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    AnalysisStarted {},
    Timeout {},
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Stateless decoder for analysis stream frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDecoder;

impl EventDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a frame, dropping anything invalid.
    pub fn decode(&self, raw: &str) -> Option<Event> {
        match Self::try_decode(raw) {
            Ok(event) => Some(event),
            Err(err) => {
                debug!(error = %err, len = raw.len(), "Dropping undecodable frame");
                None
            }
        }
    }

    /// Decode a frame, reporting why it was rejected.
    pub fn try_decode(raw: &str) -> Result<Event, DecodeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::NotJson(e.to_string()))?;
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let wire: WireEvent =
            serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match wire {
            WireEvent::ModuleComplete {
                module_id,
                score,
                confidence,
                status,
                processing_ms,
            } => {
                let module_id = module_id.ok_or(DecodeError::MissingField("module_id"))?;
                let module_id: ModuleId = module_id
                    .parse()
                    .map_err(|_| DecodeError::UnknownModule(module_id))?;
                let status = ModuleStatus::from(status.ok_or(DecodeError::MissingField("status"))?);

                // Failed modules may report no numbers at all.
                let (score, confidence) = if status.is_error() {
                    (score.unwrap_or(0.0), confidence.unwrap_or(0.0))
                } else {
                    (
                        score.ok_or(DecodeError::MissingField("score"))?,
                        confidence.ok_or(DecodeError::MissingField("confidence"))?,
                    )
                };

                Ok(Event::ModuleComplete(ModuleResult::new(
                    module_id,
                    unit_interval("score", score)?,
                    unit_interval("confidence", confidence)?,
                    status,
                    millis(processing_ms)?,
                )))
            }

            WireEvent::Completed {
                integrity_score,
                risk_level,
                error,
            } => {
                let Some(score) = integrity_score else {
                    // Server finished without running anything.
                    return match error {
                        Some(error) => Ok(Event::Completed(Completion {
                            final_score: FinalScore::new(0.0, RiskLevel::Low),
                            error: Some(error),
                        })),
                        None => Err(DecodeError::MissingField("integrity_score")),
                    };
                };
                let score = unit_interval("integrity_score", score)?;
                let risk_level = risk_level.ok_or(DecodeError::MissingField("risk_level"))?;
                let risk: RiskLevel = risk_level
                    .parse()
                    .map_err(|_| DecodeError::InvalidRiskLevel(risk_level))?;

                if risk != score_to_risk(score) {
                    debug!(
                        score,
                        reported = %risk,
                        derived = %score_to_risk(score),
                        "Server risk level disagrees with score thresholds"
                    );
                }

                Ok(Event::Completed(Completion {
                    final_score: FinalScore::new(score, risk),
                    error,
                }))
            }

            WireEvent::AnalysisStarted {} => Ok(Event::Notice(Notice::AnalysisStarted)),
            WireEvent::Timeout {} => Ok(Event::Notice(Notice::Timeout)),
            WireEvent::Error { message, error } => Ok(Event::Notice(Notice::ServerError(
                message
                    .or(error)
                    .unwrap_or_else(|| "unspecified server error".to_string()),
            ))),
            WireEvent::Unknown => Err(DecodeError::UnknownType(type_name.unwrap_or_default())),
        }
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<f64, DecodeError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DecodeError::OutOfRange { field, value })
    }
}

fn millis(value: Option<f64>) -> Result<u64, DecodeError> {
    match value {
        None => Ok(0),
        Some(ms) if ms.is_finite() && ms >= 0.0 => Ok(ms.round() as u64),
        Some(ms) => Err(DecodeError::OutOfRange {
            field: "processing_ms",
            value: ms,
        }),
    }
}
