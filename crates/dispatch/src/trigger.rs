//! REST client for the Trigger.dev runs API.
//!
//! Submission triggers the configured transcription task with
//! `POST /api/v1/runs`; polling and cancellation address the run by the ID
//! that call returns.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::client::{DispatchClient, DispatchError, MediaLocator, SubmitRequest};

/// Default Trigger.dev API host.
pub const DEFAULT_BASE_URL: &str = "https://api.trigger.dev";

/// Default task identifier of the transcription task.
pub const DEFAULT_TASK_ID: &str = "transcribe-audio";

/// Connection settings for [`TriggerClient`].
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub base_url: String,
    pub api_key: String,
    pub task_id: String,
    /// Per-request timeout for submit and poll.
    pub timeout: Duration,
}

/// Response returned by `POST /api/v1/runs`.
#[derive(Debug, Deserialize)]
struct TriggerRunResponse {
    id: Option<String>,
}

/// HTTP client for one Trigger.dev project.
pub struct TriggerClient {
    client: reqwest::Client,
    config: TriggerConfig,
}

impl TriggerClient {
    /// Build a client with its own connection pool.
    pub fn new(config: TriggerConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Build a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: TriggerConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or return a
    /// [`DispatchError::Backend`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DispatchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DispatchError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// JSON body for triggering the transcription task.
///
/// Carries exactly one of `file_path` / `file_url`.
pub fn build_submit_body(task_id: &str, request: &SubmitRequest) -> serde_json::Value {
    let mut payload = json!({
        "job_id": request.job_id.to_string(),
        "language": request.language,
        "webhook_url": request.webhook_url,
    });
    match &request.media {
        MediaLocator::FilePath(path) => payload["file_path"] = json!(path),
        MediaLocator::FileUrl(url) => payload["file_url"] = json!(url),
    }
    json!({
        "task": task_id,
        "payload": payload,
    })
}

#[async_trait]
impl DispatchClient for TriggerClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, DispatchError> {
        let body = build_submit_body(&self.config.task_id, request);

        let response = self
            .client
            .post(self.url("/api/v1/runs"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let run: TriggerRunResponse = Self::ensure_success(response).await?.json().await?;
        let handle = run
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DispatchError::InvalidResponse("run response has no id".into()))?;

        tracing::debug!(job_id = %request.job_id, run_id = %handle, "Trigger run created");
        Ok(handle)
    }

    async fn poll(&self, handle: &str) -> Result<serde_json::Value, DispatchError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/runs/{handle}")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        Ok(Self::ensure_success(response).await?.json().await?)
    }

    async fn cancel(&self, handle: &str) -> Result<bool, DispatchError> {
        let response = self
            .client
            .post(self.url(&format!("/api/v1/runs/{handle}/cancel")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        match Self::ensure_success(response).await {
            Ok(_) => Ok(true),
            Err(DispatchError::Backend { status, body }) => {
                tracing::warn!(run_id = %handle, status, body = %body, "Trigger refused cancellation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn request(media: MediaLocator) -> SubmitRequest {
        SubmitRequest {
            job_id: Uuid::nil(),
            media,
            language: "pt".into(),
            webhook_url: "https://echo.example.com/webhooks/transcription".into(),
        }
    }

    #[test]
    fn submit_body_for_local_file_has_only_file_path() {
        let body = build_submit_body(
            "transcribe-audio",
            &request(MediaLocator::FilePath("/srv/uploads/a.wav".into())),
        );
        assert_eq!(body["task"], "transcribe-audio");
        let payload = &body["payload"];
        assert_eq!(payload["job_id"], Uuid::nil().to_string());
        assert_eq!(payload["language"], "pt");
        assert_eq!(payload["file_path"], "/srv/uploads/a.wav");
        assert!(payload.get("file_url").is_none());
    }

    #[test]
    fn submit_body_for_url_has_only_file_url() {
        let body = build_submit_body(
            "transcribe-audio",
            &request(MediaLocator::FileUrl("https://cdn/a.mp3".into())),
        );
        let payload = &body["payload"];
        assert_eq!(payload["file_url"], "https://cdn/a.mp3");
        assert!(payload.get("file_path").is_none());
        assert_eq!(
            payload["webhook_url"],
            "https://echo.example.com/webhooks/transcription"
        );
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = TriggerClient::with_client(
            reqwest::Client::new(),
            TriggerConfig {
                base_url: "https://api.trigger.dev/".into(),
                api_key: "tr_dev_x".into(),
                task_id: DEFAULT_TASK_ID.into(),
                timeout: Duration::from_secs(5),
            },
        );
        assert_eq!(client.url("/api/v1/runs"), "https://api.trigger.dev/api/v1/runs");
    }
}
