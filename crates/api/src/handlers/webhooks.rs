//! Backend callback handler.
//!
//! The body is parsed by hand so a malformed payload gets the same JSON
//! error envelope as every other 400.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use echo_core::transcript::{Segment, TranscriptResult};
use echo_db::models::status::JobStatus;
use serde::{Deserialize, Serialize};

use crate::engine::orchestrator::JobEvent;
use crate::error::{AppError, AppResult};
use crate::handlers::parse_job_id;
use crate::state::AppState;

/// Callback body sent by the transcription task.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub job_id: String,
    pub status: String,
    pub text: Option<String>,
    pub segments: Option<Vec<Segment>>,
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub error_message: Option<String>,
}

impl WebhookPayload {
    pub fn into_event(self) -> Result<JobEvent, AppError> {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(JobEvent::Processing),
            "completed" => Ok(JobEvent::Completed(TranscriptResult::from_parts(
                self.text,
                self.segments,
                self.language,
                self.duration,
            ))),
            "failed" => Ok(JobEvent::Failed(self.error_message)),
            other => Err(AppError::BadRequest(format!(
                "Unsupported webhook status '{other}'. Use: processing, completed, failed"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub message: &'static str,
    pub job_id: String,
    pub status: JobStatus,
    /// `false` when the event was a duplicate or arrived after a terminal state.
    pub applied: bool,
}

/// POST /webhooks/transcription
///
/// 400 for a malformed body, 404 for an unknown job, 200 whether the event
/// was applied or ignored. A store failure is a 500 so the sender retries.
pub async fn transcription_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {e}")))?;

    tracing::info!(job_id = %payload.job_id, status = %payload.status, "Webhook received");

    let id = parse_job_id(&payload.job_id)?;
    let event = payload.into_event()?;
    let outcome = state.orchestrator.apply_event(id, event).await?;

    Ok(Json(WebhookAck {
        message: if outcome.applied {
            "Webhook processed"
        } else {
            "Webhook acknowledged, no change"
        },
        job_id: id.to_string(),
        status: outcome.job.status(),
        applied: outcome.applied,
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn payload(status: &str) -> WebhookPayload {
        WebhookPayload {
            job_id: uuid::Uuid::nil().to_string(),
            status: status.into(),
            text: None,
            segments: Some(vec![Segment {
                start: 0.0,
                end: 1.0,
                text: " hello ".into(),
            }]),
            language: Some("en".into()),
            duration: None,
            error_message: None,
        }
    }

    #[test]
    fn completed_rebuilds_missing_text_from_segments() {
        let event = payload("COMPLETED").into_event().unwrap();
        assert_matches!(event, JobEvent::Completed(result) => {
            assert_eq!(result.text, "hello");
            assert_eq!(result.language.as_deref(), Some("en"));
        });
    }

    #[test]
    fn failed_keeps_optional_message() {
        assert_matches!(payload("failed").into_event().unwrap(), JobEvent::Failed(None));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_matches!(payload("queued").into_event(), Err(AppError::BadRequest(_)));
    }
}
