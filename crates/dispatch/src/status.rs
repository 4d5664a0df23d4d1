//! Backend status vocabulary translation.
//!
//! Backends name their states differently, and those names drift between
//! versions. Every known name maps to one of the four local states through
//! [`STATUS_TABLE`]; anything else reads as `Pending` so an unfamiliar
//! value never fails a job.

use echo_core::transcript::{Segment, TranscriptResult};
use echo_db::models::status::JobStatus;

use crate::client::BackendSnapshot;

/// Known backend state names (lowercase) and their local equivalents.
pub const STATUS_TABLE: &[(&str, JobStatus)] = &[
    // Accepted but not yet running.
    ("queued", JobStatus::Pending),
    ("waiting", JobStatus::Pending),
    ("pending", JobStatus::Pending),
    ("delayed", JobStatus::Pending),
    ("pending_version", JobStatus::Pending),
    ("waiting_for_deploy", JobStatus::Pending),
    ("reattempting", JobStatus::Pending),
    ("frozen", JobStatus::Pending),
    // Running.
    ("executing", JobStatus::Processing),
    ("running", JobStatus::Processing),
    ("processing", JobStatus::Processing),
    ("started", JobStatus::Processing),
    // Finished successfully.
    ("success", JobStatus::Completed),
    ("succeeded", JobStatus::Completed),
    ("completed", JobStatus::Completed),
    ("complete", JobStatus::Completed),
    // Finished unsuccessfully.
    ("failure", JobStatus::Failed),
    ("failed", JobStatus::Failed),
    ("cancelled", JobStatus::Failed),
    ("canceled", JobStatus::Failed),
    ("crashed", JobStatus::Failed),
    ("interrupted", JobStatus::Failed),
    ("system_failure", JobStatus::Failed),
    ("expired", JobStatus::Failed),
    ("timed_out", JobStatus::Failed),
];

/// Translate a backend state name. Case-insensitive; unknown → `Pending`.
pub fn translate(backend_status: &str) -> JobStatus {
    let wanted = backend_status.trim().to_ascii_lowercase();
    STATUS_TABLE
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, status)| *status)
        .unwrap_or(JobStatus::Pending)
}

/// Interpret a runs-API style blob: `{status, output?, error?}`.
pub fn snapshot_from_blob(blob: &serde_json::Value) -> BackendSnapshot {
    let raw_status = blob
        .get("status")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let status = raw_status.as_deref().map(translate).unwrap_or(JobStatus::Pending);

    let result = match status {
        JobStatus::Completed => blob.get("output").and_then(result_from_output),
        _ => None,
    };

    let error = match status {
        JobStatus::Failed => Some(error_message(blob, raw_status.as_deref())),
        _ => None,
    };

    BackendSnapshot {
        status,
        raw_status,
        result,
        error,
    }
}

/// Extract a transcript from a run's output, if it carries one.
fn result_from_output(output: &serde_json::Value) -> Option<TranscriptResult> {
    let text = output.get("text").and_then(|v| v.as_str()).map(str::to_string);
    let segments = output
        .get("segments")
        .and_then(|v| serde_json::from_value::<Vec<Segment>>(v.clone()).ok());

    if text.is_none() && segments.is_none() {
        return None;
    }

    let language = output
        .get("language")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let duration = output.get("duration").and_then(|v| v.as_f64());

    Some(TranscriptResult::from_parts(text, segments, language, duration))
}

fn error_message(blob: &serde_json::Value, raw_status: Option<&str>) -> String {
    let error = blob.get("error");
    error
        .and_then(|e| e.as_str())
        .or_else(|| error.and_then(|e| e.get("message")).and_then(|m| m.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "Backend reported status {}",
                raw_status.unwrap_or("unknown")
            )
        })
}
