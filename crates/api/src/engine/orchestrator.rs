//! Transcription job state machine.
//!
//! ```text
//! intake ──▶ PENDING ──▶ PROCESSING ──▶ COMPLETED
//!               │             │
//!               └─────────────┴───────▶ FAILED   (backend error, submit error, cancel)
//! ```
//!
//! Status changes are conditional updates in [`JobRepo`]; the orchestrator
//! never decides a race itself. Side effects (cache, artifact cleanup) run
//! only for the caller whose transition was applied, so duplicate webhook
//! deliveries and a webhook racing the poll reconciler are harmless.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use echo_core::error::CoreError;
use echo_core::estimation::estimate_transcription_secs;
use echo_core::language::normalize_language;
use echo_core::transcript::TranscriptResult;
use echo_core::types::JobId;
use echo_db::models::job::{Job, JobListQuery, JobSource, NewJob};
use echo_db::repositories::{JobRepo, TransitionOutcome};
use echo_db::DbPool;
use echo_dispatch::{DispatchClient, DispatchError, MediaLocator, SubmitRequest};
use uuid::Uuid;

use crate::engine::artifacts::ArtifactStore;
use crate::engine::cache::JobCacheHandle;
use crate::error::{AppError, AppResult};

/// Error message written when a user cancels a job.
pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Error message written when a failure event carries none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Transcription failed";

/// Jobs examined per artifact sweep.
const ARTIFACT_SWEEP_BATCH: i64 = 100;

/// Caller-supplied options shared by both intake kinds.
#[derive(Debug, Clone, Default)]
pub struct IntakeOptions {
    pub language: Option<String>,
    pub webhook_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// An accepted job plus the processing estimate reported to the caller.
#[derive(Debug)]
pub struct IntakeOutcome {
    pub job: Job,
    pub estimated_time: Option<u64>,
}

/// A status report about a job, from a webhook or the poll reconciler.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Processing,
    Completed(TranscriptResult),
    Failed(Option<String>),
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Result of feeding an event into the state machine.
#[derive(Debug)]
pub struct EventOutcome {
    /// The job after the event, or as the winning writer left it.
    pub job: Job,
    /// `false` when the event was acknowledged without any change.
    pub applied: bool,
}

/// Intake options after validation.
struct ValidatedOptions {
    language: String,
    webhook_url: String,
    metadata: serde_json::Value,
}

/// Coordinates the dispatch backend, job store, cache and artifact store.
pub struct JobOrchestrator {
    pool: DbPool,
    dispatch: Arc<dyn DispatchClient>,
    cache: JobCacheHandle,
    artifacts: ArtifactStore,
    default_webhook_url: String,
    cancel_timeout: Duration,
}

impl JobOrchestrator {
    pub fn new(
        pool: DbPool,
        dispatch: Arc<dyn DispatchClient>,
        cache: JobCacheHandle,
        artifacts: ArtifactStore,
        default_webhook_url: String,
        cancel_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            dispatch,
            cache,
            artifacts,
            default_webhook_url,
            cancel_timeout,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn dispatch(&self) -> &dyn DispatchClient {
        self.dispatch.as_ref()
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Accept an uploaded file: store it, record the job and submit it.
    pub async fn intake_upload(
        &self,
        original_name: Option<&str>,
        data: &[u8],
        options: IntakeOptions,
    ) -> AppResult<IntakeOutcome> {
        if data.is_empty() {
            return Err(CoreError::Validation("Uploaded file is empty".into()).into());
        }
        let options = self.validate_options(options)?;

        let id = Uuid::new_v4();
        let path = self
            .artifacts
            .save(id, original_name, data)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;

        let source = JobSource::Artifact(path.to_string_lossy().into_owned());
        let job = match self.create_job(id, source, options).await {
            Ok(job) => job,
            Err(e) => {
                if let Err(del) = self.artifacts.delete(&path).await {
                    tracing::warn!(job_id = %id, error = %del, "Failed to remove orphaned upload");
                }
                return Err(e);
            }
        };

        let job = self.submit(job).await?;
        Ok(IntakeOutcome {
            job,
            estimated_time: Some(estimate_transcription_secs(data.len() as u64)),
        })
    }

    /// Accept a remote media URL: record the job and submit it.
    pub async fn intake_url(&self, url: &str, options: IntakeOptions) -> AppResult<IntakeOutcome> {
        let url = validate_http_url(url, "url")?;
        let options = self.validate_options(options)?;

        let job = self
            .create_job(Uuid::new_v4(), JobSource::Url(url), options)
            .await?;
        let job = self.submit(job).await?;
        Ok(IntakeOutcome {
            job,
            estimated_time: None,
        })
    }

    fn validate_options(&self, options: IntakeOptions) -> AppResult<ValidatedOptions> {
        let language = normalize_language(options.language.as_deref())?;

        let webhook_url = match options.webhook_url.as_deref().map(str::trim) {
            None | Some("") => self.default_webhook_url.clone(),
            Some(url) => validate_http_url(url, "webhook_url")?,
        };

        let metadata = match options.metadata {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(value @ serde_json::Value::Object(_)) => value,
            Some(_) => {
                return Err(CoreError::Validation("metadata must be a JSON object".into()).into())
            }
        };

        Ok(ValidatedOptions {
            language,
            webhook_url,
            metadata,
        })
    }

    async fn create_job(
        &self,
        id: JobId,
        source: JobSource,
        options: ValidatedOptions,
    ) -> AppResult<Job> {
        let job = JobRepo::create(
            &self.pool,
            &NewJob {
                id,
                source,
                language: options.language,
                webhook_url: options.webhook_url,
                metadata: options.metadata,
            },
        )
        .await?;
        tracing::info!(job_id = %job.id, language = %job.language, "Job created");
        Ok(job)
    }

    /// Hand a pending job to the backend.
    ///
    /// On failure the job is marked failed before the error is returned, so
    /// a rejected submission never leaves a job pending forever.
    async fn submit(&self, mut job: Job) -> AppResult<Job> {
        let media = match job.source() {
            JobSource::Artifact(path) => self.artifacts.media_locator(&path),
            JobSource::Url(url) => MediaLocator::FileUrl(url),
        };
        let request = SubmitRequest {
            job_id: job.id,
            media,
            language: job.language.clone(),
            webhook_url: job.webhook_url.clone(),
        };

        match self.dispatch.submit(&request).await {
            Ok(handle) => {
                if JobRepo::attach_external_handle(&self.pool, job.id, &handle).await? {
                    job.external_handle = Some(handle);
                } else {
                    tracing::warn!(job_id = %job.id, run_id = %handle, "Job already had an external handle");
                }
                tracing::info!(job_id = %job.id, "Job submitted to dispatch backend");
                Ok(job)
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Dispatch submission failed");
                let message = format!("Dispatch submission failed: {e}");
                match JobRepo::fail(&self.pool, job.id, &message).await? {
                    TransitionOutcome::Applied(failed) => self.on_terminal(&failed),
                    TransitionOutcome::Rejected(_) | TransitionOutcome::NotFound => {}
                }
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Apply a backend status report. Webhooks and the poll reconciler both
    /// come through here.
    ///
    /// Events against a terminal job are acknowledged without mutation or
    /// side effects.
    pub async fn apply_event(&self, id: JobId, event: JobEvent) -> AppResult<EventOutcome> {
        let kind = event.name();
        let outcome = match event {
            JobEvent::Processing => JobRepo::mark_processing(&self.pool, id).await?,
            JobEvent::Completed(result) => JobRepo::complete(&self.pool, id, &result).await?,
            JobEvent::Failed(message) => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                JobRepo::fail(&self.pool, id, &message).await?
            }
        };

        match outcome {
            TransitionOutcome::Applied(job) => {
                tracing::info!(job_id = %id, event = kind, status = %job.status(), "Job event applied");
                if job.is_terminal() {
                    self.on_terminal(&job);
                }
                Ok(EventOutcome { job, applied: true })
            }
            TransitionOutcome::Rejected(job) => {
                tracing::debug!(job_id = %id, event = kind, status = %job.status(), "Job event ignored");
                Ok(EventOutcome {
                    job,
                    applied: false,
                })
            }
            TransitionOutcome::NotFound => Err(not_found(id)),
        }
    }

    /// Side effects of arriving at a terminal state. Runs once per job.
    fn on_terminal(&self, job: &Job) {
        self.cache.put(job);
        if let Some(path) = job.artifact_path() {
            self.schedule_artifact_cleanup(job.id, PathBuf::from(path));
        }
    }

    /// Remove an artifact after the grace period, off the caller's path.
    ///
    /// The task lives only in memory; [`Self::sweep_artifacts`] picks up
    /// any deletion it did not get to finish.
    fn schedule_artifact_cleanup(&self, job_id: JobId, path: PathBuf) {
        let pool = self.pool.clone();
        let artifacts = self.artifacts.clone();
        tokio::spawn(async move {
            let grace = artifacts.delete_grace();
            if !grace.is_zero() {
                tokio::time::sleep(grace).await;
            }
            remove_artifact(&pool, &artifacts, job_id, &path).await;
        });
    }

    /// Delete artifacts of terminal jobs that finished more than the grace
    /// period ago but were never recorded as deleted, such as when the
    /// process stopped while a deferred deletion was still waiting.
    ///
    /// Returns how many artifacts were cleaned up.
    pub async fn sweep_artifacts(&self) -> Result<usize, sqlx::Error> {
        let jobs = JobRepo::list_pending_artifact_cleanup(
            &self.pool,
            self.artifacts.delete_grace().as_secs_f64(),
            ARTIFACT_SWEEP_BATCH,
        )
        .await?;

        let mut cleaned = 0;
        for job in &jobs {
            let Some(path) = job.artifact_path() else {
                continue;
            };
            if remove_artifact(&self.pool, &self.artifacts, job.id, Path::new(path)).await {
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look a job up, cache first.
    pub async fn query(&self, id: JobId) -> AppResult<Job> {
        if let Some(job) = self.cache.get(id) {
            return Ok(job);
        }
        let job = JobRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.cache.put(&job);
        Ok(job)
    }

    /// One page of jobs plus the total matching the filter. Never cached.
    pub async fn list(&self, query: &JobListQuery) -> AppResult<(Vec<Job>, i64)> {
        let jobs = JobRepo::list(&self.pool, query).await?;
        let total = JobRepo::count(&self.pool, query.status).await?;
        Ok((jobs, total))
    }

    // -----------------------------------------------------------------------
    // Cancel
    // -----------------------------------------------------------------------

    /// Cancel an in-flight job.
    ///
    /// The backend is asked first; the job is then failed with
    /// [`CANCELLED_MESSAGE`] unless a completion got there first, in which
    /// case the caller gets a conflict naming the winning status.
    pub async fn cancel(&self, id: JobId) -> AppResult<Job> {
        // Eligibility is read from the store, never from the cache.
        let job = JobRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| not_found(id))?;

        if job.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job cannot be cancelled, current status: {}",
                job.status()
            ))
            .into());
        }
        let Some(handle) = job.external_handle.as_deref() else {
            return Err(CoreError::Conflict(
                "Job has not been accepted by the transcription backend yet".into(),
            )
            .into());
        };

        let accepted = tokio::time::timeout(self.cancel_timeout, self.dispatch.cancel(handle))
            .await
            .map_err(|_| DispatchError::Timeout(self.cancel_timeout))??;
        if !accepted {
            return Err(DispatchError::Refused(handle.to_string()).into());
        }

        match JobRepo::fail(&self.pool, id, CANCELLED_MESSAGE).await? {
            TransitionOutcome::Applied(job) => {
                tracing::info!(job_id = %id, "Job cancelled");
                self.on_terminal(&job);
                Ok(job)
            }
            TransitionOutcome::Rejected(job) => Err(CoreError::Conflict(format!(
                "Job finished before it could be cancelled, current status: {}",
                job.status()
            ))
            .into()),
            TransitionOutcome::NotFound => Err(not_found(id)),
        }
    }
}

/// Delete one artifact and record it on the job. Returns `true` once the
/// deletion is recorded; I/O and store failures are logged and leave the
/// job for the next sweep.
async fn remove_artifact(
    pool: &DbPool,
    artifacts: &ArtifactStore,
    job_id: JobId,
    path: &Path,
) -> bool {
    match artifacts.delete(path).await {
        Ok(true) => {
            tracing::info!(job_id = %job_id, path = %path.display(), "Artifact deleted");
        }
        Ok(false) => {
            tracing::debug!(job_id = %job_id, path = %path.display(), "Artifact already gone");
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, path = %path.display(), error = %e, "Artifact deletion failed");
            return false;
        }
    }

    match JobRepo::mark_artifact_deleted(pool, job_id).await {
        Ok(marked) => marked,
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to record artifact deletion");
            false
        }
    }
}

fn not_found(id: JobId) -> AppError {
    CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }
    .into()
}

/// Accept only absolute `http`/`https` URLs with a host.
fn validate_http_url(raw: &str, field: &str) -> Result<String, CoreError> {
    let raw = raw.trim();
    let parsed = reqwest::Url::parse(raw)
        .map_err(|_| CoreError::Validation(format!("{field} is not a valid URL")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(CoreError::Validation(format!(
            "{field} must be an http or https URL"
        )));
    }
    Ok(raw.to_string())
}
