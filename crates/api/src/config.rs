use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use echo_dispatch::trigger::{TriggerConfig, DEFAULT_BASE_URL, DEFAULT_TASK_ID};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks after the server stops (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Public base URL of this service, used for the default webhook target.
    pub app_url: String,
    /// Upload and artifact settings.
    pub artifacts: ArtifactConfig,
    /// Job cache settings.
    pub cache: CacheConfig,
    /// Dispatch backend settings.
    pub dispatch: DispatchConfig,
    /// Poll reconciler settings.
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    /// Directory uploaded media is written to.
    pub upload_dir: PathBuf,
    /// Largest accepted multipart body.
    pub max_upload_bytes: usize,
    /// When set, the backend receives `{base}/{file}` instead of a local path.
    pub public_base_url: Option<String>,
    /// Delay between a job turning terminal and its artifact being removed.
    pub delete_grace_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: u64,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub base_url: String,
    pub api_key: String,
    pub task_id: String,
    /// Timeout for submit and poll requests.
    pub timeout_secs: u64,
    /// Separate, shorter budget for cancellation requests.
    pub cancel_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Seconds between reconciliation passes. `0` disables the task.
    pub interval_secs: u64,
    /// Minimum age of the last update before a job is polled.
    pub stale_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                      |
    /// |--------------------------------|------------------------------|
    /// | `HOST`                         | `0.0.0.0`                    |
    /// | `PORT`                         | `8000`                       |
    /// | `CORS_ORIGINS`                 | `http://localhost:3000`      |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                         |
    /// | `APP_URL`                      | `http://localhost:8000`      |
    /// | `UPLOAD_DIR`                   | `uploads`                    |
    /// | `MAX_UPLOAD_BYTES`             | `524288000` (500 MiB)        |
    /// | `ARTIFACT_PUBLIC_BASE_URL`     | unset                        |
    /// | `ARTIFACT_DELETE_GRACE_SECS`   | `300`                        |
    /// | `CACHE_ENABLED`                | `true`                       |
    /// | `CACHE_TTL_SECS`               | `86400`                      |
    /// | `CACHE_MAX_ENTRIES`            | `10000`                      |
    /// | `DISPATCH_BASE_URL`            | `https://api.trigger.dev`    |
    /// | `DISPATCH_API_KEY`             | empty                        |
    /// | `DISPATCH_TASK_ID`             | `transcribe-audio`           |
    /// | `DISPATCH_TIMEOUT_SECS`        | `30`                         |
    /// | `DISPATCH_CANCEL_TIMEOUT_SECS` | `10`                         |
    /// | `RECONCILE_INTERVAL_SECS`      | `60`                         |
    /// | `RECONCILE_STALE_SECS`         | `600`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", 8000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let app_url = std::env::var("APP_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        let artifacts = ArtifactConfig {
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".into())
                .into(),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 500 * 1024 * 1024),
            public_base_url: std::env::var("ARTIFACT_PUBLIC_BASE_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            delete_grace_secs: parse_var("ARTIFACT_DELETE_GRACE_SECS", 300),
        };

        let cache = CacheConfig {
            enabled: parse_var("CACHE_ENABLED", true),
            ttl_secs: parse_var("CACHE_TTL_SECS", 24 * 3600),
            max_entries: parse_var("CACHE_MAX_ENTRIES", 10_000),
        };

        let dispatch = DispatchConfig {
            base_url: std::env::var("DISPATCH_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            api_key: std::env::var("DISPATCH_API_KEY").unwrap_or_default(),
            task_id: std::env::var("DISPATCH_TASK_ID")
                .unwrap_or_else(|_| DEFAULT_TASK_ID.into()),
            timeout_secs: parse_var("DISPATCH_TIMEOUT_SECS", 30),
            cancel_timeout_secs: parse_var("DISPATCH_CANCEL_TIMEOUT_SECS", 10),
        };

        let reconcile = ReconcileConfig {
            interval_secs: parse_var("RECONCILE_INTERVAL_SECS", 60),
            stale_secs: parse_var("RECONCILE_STALE_SECS", 600),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", 30),
            app_url,
            artifacts,
            cache,
            dispatch,
            reconcile,
        }
    }

    /// Callback target used when a caller does not supply one.
    pub fn default_webhook_url(&self) -> String {
        format!("{}/webhooks/transcription", self.app_url.trim_end_matches('/'))
    }
}

impl DispatchConfig {
    pub fn trigger(&self) -> TriggerConfig {
        TriggerConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            task_id: self.task_id.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Parse an optional env var, panicking on a malformed value.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} has an invalid value: '{raw}'")),
        Err(_) => default,
    }
}
