//! Transcription job entity and DTOs.

use echo_core::transcript::Segment;
use echo_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status_id: StatusId,
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub language: String,
    pub webhook_url: String,
    pub external_handle: Option<String>,
    pub result_text: Option<String>,
    pub result_segments: Option<Json<Vec<Segment>>>,
    pub result_language: Option<String>,
    pub duration_secs: Option<f64>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    /// When the uploaded artifact was removed after the job finished.
    pub artifact_deleted_at: Option<Timestamp>,
}

impl Job {
    /// Decoded status. Unknown IDs read as `Pending`, which keeps the job
    /// eligible for reconciliation rather than freezing it.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// The job's media source.
    ///
    /// The `ck_jobs_single_source` constraint guarantees exactly one column
    /// is set.
    pub fn source(&self) -> JobSource {
        match (&self.file_path, &self.file_url) {
            (Some(path), _) => JobSource::Artifact(path.clone()),
            (None, url) => JobSource::Url(url.clone().unwrap_or_default()),
        }
    }

    /// Path of the locally owned artifact, if this job was uploaded.
    pub fn artifact_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn segments(&self) -> &[Segment] {
        self.result_segments
            .as_ref()
            .map(|s| s.0.as_slice())
            .unwrap_or(&[])
    }
}

/// Where a job's media comes from. Exactly one source per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    /// Absolute path of an upload stored by the artifact store.
    Artifact(String),
    /// Remote media URL supplied by the caller.
    Url(String),
}

impl JobSource {
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::Artifact(path) => Some(path),
            Self::Url(_) => None,
        }
    }

    pub fn file_url(&self) -> Option<&str> {
        match self {
            Self::Artifact(_) => None,
            Self::Url(url) => Some(url),
        }
    }
}

/// DTO for inserting a new pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub source: JobSource,
    pub language: String,
    pub webhook_url: String,
    pub metadata: serde_json::Value,
}

/// Validated listing filter for `JobRepo::list`.
#[derive(Debug, Clone, Copy)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub limit: i64,
    pub offset: i64,
}
