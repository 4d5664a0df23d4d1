//! Handlers for job queries, downloads, cancellation and listing.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use echo_core::error::CoreError;
use echo_core::export::{render, TranscriptExport};
use echo_core::transcript::Segment;
use echo_core::types::Timestamp;
use echo_db::models::job::Job;
use echo_db::models::status::JobStatus;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::parse_job_id;
use crate::query::{DownloadParams, ListParams};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Full view of one job.
#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub text: Option<String>,
    pub segments: Option<Vec<Segment>>,
    /// Detected language once completed.
    pub language: Option<String>,
    pub requested_language: String,
    pub duration: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
}

impl From<Job> for TranscriptionResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status(),
            text: job.result_text,
            segments: job.result_segments.map(|s| s.0),
            language: job.result_language,
            requested_language: job.language,
            duration: job.duration_secs,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            metadata: job.metadata,
        }
    }
}

/// Compact view used by the listing endpoint.
#[derive(Debug, Serialize)]
pub struct TranscriptionSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub language: String,
    pub file_url: Option<String>,
    pub duration: Option<f64>,
    pub has_text: bool,
    pub error_message: Option<String>,
}

impl From<Job> for TranscriptionSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            language: job.result_language.unwrap_or(job.language),
            file_url: job.file_url,
            duration: job.duration_secs,
            has_text: job.result_text.is_some_and(|t| !t.is_empty()),
            error_message: job.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptionList {
    pub transcriptions: Vec<TranscriptionSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: &'static str,
    pub job_id: String,
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/transcription/{id}
pub async fn get_transcription(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<TranscriptionResponse>> {
    let id = parse_job_id(&job_id)?;
    let job = state.orchestrator.query(id).await?;
    Ok(Json(job.into()))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /api/v1/transcription/{id}/download?format=txt|json|srt|vtt
///
/// Only completed jobs can be downloaded; anything else is a 400.
pub async fn download_transcription(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<DownloadParams>,
) -> AppResult<Response> {
    let format = params.format()?;
    let id = parse_job_id(&job_id)?;
    let job = state.orchestrator.query(id).await?;

    if job.status() != JobStatus::Completed {
        return Err(CoreError::Validation(format!(
            "Transcription not completed, current status: {}",
            job.status()
        ))
        .into());
    }

    let job_id = job.id.to_string();
    let export = TranscriptExport {
        job_id: &job_id,
        text: job.result_text.as_deref().unwrap_or_default(),
        segments: job.segments(),
        language: job.result_language.as_deref(),
        duration: job.duration_secs,
        created_at: Some(job.created_at),
        completed_at: job.completed_at,
    };
    let body = render(&export, format);

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", format.file_name(&job_id)),
            ),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// DELETE /api/v1/transcription/{id}
///
/// 409 when the job is already terminal, has no backend handle yet, or a
/// completion won the race against this cancel.
pub async fn cancel_transcription(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<CancelResponse>> {
    let id = parse_job_id(&job_id)?;
    let job = state.orchestrator.cancel(id).await?;
    Ok(Json(CancelResponse {
        message: "Job cancelled successfully",
        job_id: job.id.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/transcriptions?status=&limit=&offset=
pub async fn list_transcriptions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<TranscriptionList>> {
    let query = params.validate()?;
    let (jobs, total) = state.orchestrator.list(&query).await?;

    Ok(Json(TranscriptionList {
        transcriptions: jobs.into_iter().map(Into::into).collect(),
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}
