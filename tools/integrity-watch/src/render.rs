//! Plain-text rendering of session snapshots and reports.

use shared_types::{
    ConnectionStatus, FinalScore, IntegrityReport, ModuleId, ModuleResult, SessionState,
};

/// One line per analysis module.
pub fn module_line(result: &ModuleResult) -> String {
    if result.status.is_error() {
        return format!(
            "  {:<16} error    ({} ms)",
            result.module_id.label(),
            result.processing_ms
        );
    }
    format!(
        "  {:<16} score {:.2}  confidence {:.2}  {:<6} ({} ms)",
        result.module_id.label(),
        result.score,
        result.confidence,
        result.risk().as_str(),
        result.processing_ms
    )
}

pub fn verdict_line(final_score: &FinalScore) -> String {
    format!(
        "Integrity score {:.2}: {} risk",
        final_score.score, final_score.risk
    )
}

/// Lines describing what changed between two snapshots.
pub fn progress_lines(previous: &SessionState, next: &SessionState) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.connection_status != next.connection_status
        && next.connection_status != ConnectionStatus::Closed
    {
        lines.push(format!("[{}]", next.connection_status));
    }

    for (module_id, result) in &next.results {
        if previous.results.get(module_id) != Some(result) {
            lines.push(module_line(result));
        }
    }

    if !previous.completed && next.completed {
        if let Some(final_score) = &next.final_score {
            lines.push(verdict_line(final_score));
        }
    }

    if previous.report.is_none() {
        if let Some(report) = &next.report {
            if let Some(recommendation) = &report.recommendation {
                lines.push(format!("Recommendation: {recommendation}"));
            }
            for flag in &report.flags {
                lines.push(format!(
                    "  flag {:<16} {:.2} {}",
                    flag.module, flag.score, flag.severity
                ));
            }
            if let Some(url) = &report.pdf_download_url {
                lines.push(format!("PDF report: {url}"));
            }
        }
    }

    lines
}

/// Full text rendering of a fetched report.
pub fn report_text(report: &IntegrityReport) -> String {
    let mut out = format!(
        "Submission {}\nIntegrity score {:.2}: {} risk\n",
        report.submission_id, report.integrity_score, report.risk_level
    );
    if let Some(confidence) = report.confidence {
        out.push_str(&format!("Confidence {confidence:.2}\n"));
    }
    if let Some(recommendation) = &report.recommendation {
        out.push_str(&format!("Recommendation: {recommendation}\n"));
    }

    for module_id in ModuleId::ALL {
        let Some(module) = report.module(module_id) else {
            continue;
        };
        let score = module
            .score
            .map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
        let weight = module
            .weight
            .map_or_else(|| "-".to_string(), |w| format!("{w:.2}"));
        out.push_str(&format!(
            "  {:<16} score {score:<5} weight {weight}\n",
            module_id.label()
        ));
    }

    for flag in &report.flags {
        out.push_str(&format!(
            "  flag {:<16} {:.2} {}\n",
            flag.module, flag.score, flag.severity
        ));
    }
    if let Some(url) = &report.pdf_download_url {
        out.push_str(&format!("PDF report: {url}\n"));
    }
    out
}
