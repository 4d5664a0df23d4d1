#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use echo_api::config::{ArtifactConfig, CacheConfig, DispatchConfig, ReconcileConfig, ServerConfig};
use echo_api::engine::artifacts::ArtifactStore;
use echo_api::engine::cache::{JobCacheHandle, MokaJobCache};
use echo_api::engine::orchestrator::JobOrchestrator;
use echo_api::router::build_app_router;
use echo_api::state::AppState;
use echo_core::transcript::{Segment, TranscriptResult};
use echo_core::types::JobId;
use echo_db::repositories::JobRepo;
use echo_dispatch::{DispatchClient, DispatchError, SubmitRequest};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

pub const WEBHOOK_URL: &str = "/webhooks/transcription";
pub const MULTIPART_BOUNDARY: &str = "echo-test-boundary";

// ---------------------------------------------------------------------------
// Fake dispatch backend
// ---------------------------------------------------------------------------

/// In-memory backend that records every call.
///
/// Handles are `run_{job_id}` so a test can map a cancel back to its job.
#[derive(Default)]
pub struct FakeDispatch {
    pub submissions: Mutex<Vec<SubmitRequest>>,
    pub cancels: Mutex<Vec<String>>,
    pub polls: Mutex<Vec<String>>,
    pub fail_submit: AtomicBool,
    pub refuse_cancel: AtomicBool,
    /// Blob returned by `poll`.
    pub poll_response: Mutex<serde_json::Value>,
    /// When set, `cancel` completes the job before answering, so the
    /// completion wins the race against the cancel's own transition.
    pub complete_during_cancel: Mutex<Option<PgPool>>,
}

impl FakeDispatch {
    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }

    pub fn set_poll_response(&self, blob: serde_json::Value) {
        *self.poll_response.lock().unwrap() = blob;
    }
}

pub fn handle_for(id: JobId) -> String {
    format!("run_{id}")
}

#[async_trait]
impl DispatchClient for FakeDispatch {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, DispatchError> {
        self.submissions.lock().unwrap().push(request.clone());
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(DispatchError::Backend {
                status: 503,
                body: "backend unavailable".into(),
            });
        }
        Ok(handle_for(request.job_id))
    }

    async fn poll(&self, handle: &str) -> Result<serde_json::Value, DispatchError> {
        self.polls.lock().unwrap().push(handle.to_string());
        Ok(self.poll_response.lock().unwrap().clone())
    }

    async fn cancel(&self, handle: &str) -> Result<bool, DispatchError> {
        self.cancels.lock().unwrap().push(handle.to_string());

        let racing_pool = self.complete_during_cancel.lock().unwrap().clone();
        if let Some(pool) = racing_pool {
            let id: JobId = handle.trim_start_matches("run_").parse().unwrap();
            JobRepo::complete(&pool, id, &sample_result()).await.unwrap();
        }

        Ok(!self.refuse_cancel.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Everything a test needs to drive and inspect the service.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub dispatch: Arc<FakeDispatch>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub config: ServerConfig,
    pub upload_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn upload_root(&self) -> PathBuf {
        self.orchestrator.artifacts().root().to_path_buf()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(upload_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        app_url: "http://echo.test".to_string(),
        artifacts: ArtifactConfig {
            upload_dir: upload_dir.to_path_buf(),
            max_upload_bytes: 10 * 1024 * 1024,
            public_base_url: None,
            delete_grace_secs: 0,
        },
        cache: CacheConfig {
            enabled: true,
            ttl_secs: 3600,
            max_entries: 1000,
        },
        dispatch: DispatchConfig {
            base_url: "http://dispatch.test".to_string(),
            api_key: "tr_test".to_string(),
            task_id: "transcribe-audio".to_string(),
            timeout_secs: 5,
            cancel_timeout_secs: 2,
        },
        reconcile: ReconcileConfig {
            interval_secs: 0,
            stale_secs: 600,
        },
    }
}

/// Build the full application router over a fake backend and a temporary
/// upload directory, using the same middleware stack as production.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, |_| {}).await
}

/// Like [`build_test_app`], with a chance to adjust the configuration.
pub async fn build_test_app_with(pool: PgPool, configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(upload_dir.path());
    configure(&mut config);
    let dispatch = Arc::new(FakeDispatch::default());

    let orchestrator = build_orchestrator(pool.clone(), dispatch.clone(), &config).await;

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
    };

    TestApp {
        router: build_app_router(state, &config),
        pool,
        dispatch,
        orchestrator,
        config,
        upload_dir,
    }
}

/// Wire an orchestrator the way `main` does, over the fake backend.
pub async fn build_orchestrator(
    pool: PgPool,
    dispatch: Arc<FakeDispatch>,
    config: &ServerConfig,
) -> Arc<JobOrchestrator> {
    let artifacts = ArtifactStore::open(
        &config.artifacts.upload_dir,
        None,
        Duration::from_secs(config.artifacts.delete_grace_secs),
    )
    .await
    .unwrap();
    let cache = JobCacheHandle::new(Arc::new(MokaJobCache::new(
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.max_entries,
    )));

    Arc::new(JobOrchestrator::new(
        pool,
        dispatch,
        cache,
        artifacts,
        config.default_webhook_url(),
        Duration::from_secs(config.dispatch.cancel_timeout_secs),
    ))
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn sample_result() -> TranscriptResult {
    TranscriptResult {
        text: "hello world".into(),
        segments: vec![
            Segment {
                start: 0.0,
                end: 1.5,
                text: "hello".into(),
            },
            Segment {
                start: 1.5,
                end: 3.0,
                text: "world".into(),
            },
        ],
        language: Some("en".into()),
        duration: Some(3.0),
    }
}

pub fn completed_payload(job_id: &str) -> serde_json::Value {
    serde_json::json!({
        "job_id": job_id,
        "status": "completed",
        "text": "hello world",
        "segments": [
            { "start": 0.0, "end": 1.5, "text": "hello" },
            { "start": 1.5, "end": 3.0, "text": "world" }
        ],
        "language": "en",
        "duration": 3.0
    })
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// One multipart part: `(name, filename, content)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Upload a small file and return the new job's ID.
pub async fn upload_job(test: &TestApp) -> String {
    let response = post_multipart(
        test.app(),
        "/api/v1/upload/file",
        &[("file", Some("talk.wav"), b"RIFF....WAVE".as_slice())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Submit a URL job and return the new job's ID.
pub async fn url_job(test: &TestApp) -> String {
    let response = post_json(
        test.app(),
        "/api/v1/upload/url",
        serde_json::json!({ "url": "https://media.example.com/talk.mp3" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Wait up to two seconds for `check` to hold.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
