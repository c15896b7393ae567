//! Wire frames and report bodies as the analysis service emits them.

use serde_json::{json, Value};

pub fn analysis_started(submission_id: &str) -> Value {
    json!({
        "type": "analysis_started",
        "submission_id": submission_id,
        "timestamp": "2026-10-18T09:00:01Z",
    })
}

pub fn module_complete(module_id: &str, score: f64, confidence: f64, processing_ms: f64) -> Value {
    json!({
        "type": "module_complete",
        "module_id": module_id,
        "status": "done",
        "score": score,
        "confidence": confidence,
        "processing_ms": processing_ms,
        "timestamp": "2026-10-18T09:00:10Z",
    })
}

/// A module that crashed server-side.
pub fn module_failed(module_id: &str) -> Value {
    json!({
        "type": "module_complete",
        "module_id": module_id,
        "status": "error",
        "score": null,
        "confidence": null,
    })
}

pub fn completed(integrity_score: f64, risk_level: &str) -> Value {
    json!({
        "type": "completed",
        "integrity_score": integrity_score,
        "risk_level": risk_level,
    })
}

pub fn server_timeout() -> Value {
    json!({ "type": "timeout" })
}

/// Full report with weights and evidence for the given modules.
pub fn report(submission_id: &str, integrity_score: f64, risk_level: &str, modules: &[(&str, f64, f64)]) -> Value {
    let breakdown: serde_json::Map<String, Value> = modules
        .iter()
        .map(|(module_id, score, weight)| {
            (
                module_id.to_string(),
                json!({
                    "score": score,
                    "weight": weight,
                    "weighted_contribution": score * weight,
                    "confidence": 0.9,
                    "evidence": { "summary": format!("{module_id} evidence") },
                }),
            )
        })
        .collect();

    let flags: Vec<Value> = modules
        .iter()
        .filter(|(_, score, _)| *score >= 0.65)
        .map(|(module_id, score, _)| json!({ "module": module_id, "score": score, "severity": "HIGH" }))
        .collect();

    json!({
        "submission_id": submission_id,
        "integrity_score": integrity_score,
        "risk_level": risk_level,
        "confidence": 0.88,
        "recommendation": "Review flagged passages with the student",
        "flags": flags,
        "modules": breakdown,
        "created_at": "2026-10-18T09:00:42Z",
        "pdf_download_url": format!("/api/v1/submissions/{submission_id}/report.pdf"),
    })
}
