//! Backend-agnostic dispatch contract.

use std::time::Duration;

use async_trait::async_trait;
use echo_core::transcript::TranscriptResult;
use echo_core::types::JobId;
use echo_db::models::status::JobStatus;

use crate::status;

/// Where the backend should fetch the media from.
///
/// Exactly one of these is sent with every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocator {
    /// Path on storage shared with the backend.
    FilePath(String),
    /// URL the backend can download.
    FileUrl(String),
}

/// One unit of work handed to the backend.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub job_id: JobId,
    pub media: MediaLocator,
    pub language: String,
    pub webhook_url: String,
}

/// A polled backend state translated into local terms.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSnapshot {
    pub status: JobStatus,
    /// Backend-native status string, kept for logging.
    pub raw_status: Option<String>,
    /// Present when the backend's output carries a usable transcript.
    pub result: Option<TranscriptResult>,
    pub error: Option<String>,
}

/// Errors from a dispatch backend.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Dispatch backend error ({status}): {body}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend answered 2xx but the body was not what we expect.
    #[error("Unexpected dispatch backend response: {0}")]
    InvalidResponse(String),

    /// The backend declined to cancel the run.
    #[error("Dispatch backend refused to cancel run {0}")]
    Refused(String),

    /// The call did not finish within its budget.
    #[error("Dispatch backend did not respond within {0:?}")]
    Timeout(Duration),
}

/// Capability set of a transcription backend.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// Submit work and return the backend's handle for it.
    async fn submit(&self, request: &SubmitRequest) -> Result<String, DispatchError>;

    /// Fetch the backend-native status blob for a handle.
    ///
    /// Only used as a fallback when no webhook has arrived.
    async fn poll(&self, handle: &str) -> Result<serde_json::Value, DispatchError>;

    /// Ask the backend to cancel. `Ok(false)` means it refused.
    async fn cancel(&self, handle: &str) -> Result<bool, DispatchError>;

    /// Interpret a blob returned by [`poll`](Self::poll).
    fn snapshot(&self, blob: &serde_json::Value) -> BackendSnapshot {
        status::snapshot_from_blob(blob)
    }
}
