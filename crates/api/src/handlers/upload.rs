//! Handlers for job intake (`/upload/file`, `/upload/url`).

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use echo_core::error::CoreError;
use echo_db::models::job::Job;
use serde::{Deserialize, Serialize};

use crate::engine::orchestrator::{IntakeOptions, IntakeOutcome};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response for both intake endpoints.
#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub job_id: String,
    pub status: String,
    pub message: &'static str,
    /// Seconds; only known for uploads.
    pub estimated_time: Option<u64>,
}

impl IntakeResponse {
    fn new(outcome: IntakeOutcome, message: &'static str) -> Self {
        let IntakeOutcome {
            job,
            estimated_time,
        } = outcome;
        Self {
            job_id: job.id.to_string(),
            status: status_label(&job),
            message,
            estimated_time,
        }
    }
}

fn status_label(job: &Job) -> String {
    job.status().as_str().to_string()
}

/// Body of `POST /api/v1/upload/url`.
#[derive(Debug, Deserialize)]
pub struct UrlIntakeRequest {
    pub url: String,
    pub language: Option<String>,
    pub webhook_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// POST /api/v1/upload/file
///
/// Multipart fields: `file` (required), `language`, `webhook_url`, and
/// `metadata` as a JSON object string. Returns 201 with the new job.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<IntakeResponse>)> {
    let mut file: Option<(Option<String>, Bytes)> = None;
    let mut options = IntakeOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some((filename, data));
            }
            "language" | "webhook_url" | "metadata" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                match name.as_str() {
                    "language" => options.language = Some(value),
                    "webhook_url" => options.webhook_url = Some(value),
                    _ => options.metadata = parse_metadata(&value)?,
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let Some((filename, data)) = file else {
        return Err(CoreError::Validation("Multipart field 'file' is required".into()).into());
    };

    let outcome = state
        .orchestrator
        .intake_upload(filename.as_deref(), &data, options)
        .await?;

    tracing::info!(
        job_id = %outcome.job.id,
        bytes = data.len(),
        "Upload accepted",
    );

    Ok((
        StatusCode::CREATED,
        Json(IntakeResponse::new(
            outcome,
            "File received and transcription job created",
        )),
    ))
}

/// POST /api/v1/upload/url
///
/// Create a job for remote media. Returns 201 with the new job.
pub async fn upload_url(
    State(state): State<AppState>,
    Json(input): Json<UrlIntakeRequest>,
) -> AppResult<(StatusCode, Json<IntakeResponse>)> {
    let options = IntakeOptions {
        language: input.language,
        webhook_url: input.webhook_url,
        metadata: input.metadata,
    };
    let outcome = state.orchestrator.intake_url(&input.url, options).await?;

    tracing::info!(job_id = %outcome.job.id, "URL intake accepted");

    Ok((
        StatusCode::CREATED,
        Json(IntakeResponse::new(
            outcome,
            "Transcription job created from URL",
        )),
    ))
}

/// Parse the `metadata` multipart field. Blank means absent.
fn parse_metadata(raw: &str) -> Result<Option<serde_json::Value>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| CoreError::Validation(format!("metadata is not valid JSON: {e}")).into())
}
