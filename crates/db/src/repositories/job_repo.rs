//! Repository for the `jobs` table.
//!
//! Every status change is one conditional `UPDATE ... WHERE status_id = ANY(...)`.
//! When two writers race for the terminal slot (a cancel and a completion
//! callback, say) exactly one of them sees a row come back; the other gets
//! [`TransitionOutcome::Rejected`] carrying the row as the winner left it.

use echo_core::transcript::TranscriptResult;
use echo_core::types::JobId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::job::{Job, JobListQuery, NewJob};
use crate::models::status::{JobStatus, StatusId};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status_id, file_path, file_url, language, webhook_url, external_handle, \
    result_text, result_segments, result_language, duration_secs, \
    error_message, metadata, created_at, updated_at, completed_at, artifact_deleted_at";

/// Statuses a transition into a terminal state may start from.
const IN_FLIGHT_IDS: [StatusId; 2] = [
    JobStatus::Pending as StatusId,
    JobStatus::Processing as StatusId,
];

/// Statuses after which an upload is no longer needed.
const TERMINAL_IDS: [StatusId; 2] = [
    JobStatus::Completed as StatusId,
    JobStatus::Failed as StatusId,
];

/// Result of a conditional status transition.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// This call performed the transition; the row is the new state.
    Applied(Job),
    /// The job exists but its current status does not allow the
    /// transition. The row is the current (winning) state.
    Rejected(Job),
    /// No job with that ID.
    NotFound,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Provides persistence operations for transcription jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, status_id, file_path, file_url, language, webhook_url, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.id)
            .bind(JobStatus::Pending.id())
            .bind(input.source.file_path())
            .bind(input.source.file_url())
            .bind(&input.language)
            .bind(&input.webhook_url)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record the backend's handle for a job. The handle is set at most
    /// once; returns `false` if one was already stored.
    pub async fn attach_external_handle(
        pool: &PgPool,
        id: JobId,
        handle: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET external_handle = $2, updated_at = NOW() \
             WHERE id = $1 AND external_handle IS NULL",
        )
        .bind(id)
        .bind(handle)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a pending job to processing.
    ///
    /// Rejected for jobs already processing or terminal; neither case
    /// touches the row.
    pub async fn mark_processing(
        pool: &PgPool,
        id: JobId,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Processing.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await?;
        Self::resolve(pool, id, updated).await
    }

    /// Mark an in-flight job completed with its result bundle.
    ///
    /// Clears any error message and stamps `completed_at`. Terminal jobs
    /// are left untouched.
    pub async fn complete(
        pool: &PgPool,
        id: JobId,
        result: &TranscriptResult,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, result_text = $3, result_segments = $4, \
                 result_language = $5, duration_secs = $6, error_message = NULL, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($7) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Completed.id())
            .bind(&result.text)
            .bind(Json(&result.segments))
            .bind(&result.language)
            .bind(result.duration)
            .bind(&IN_FLIGHT_IDS[..])
            .fetch_optional(pool)
            .await?;
        Self::resolve(pool, id, updated).await
    }

    /// Mark an in-flight job failed with an error message.
    ///
    /// Used for backend failures, submission failures and user
    /// cancellation alike. Terminal jobs are left untouched.
    pub async fn fail(
        pool: &PgPool,
        id: JobId,
        error: &str,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($4) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Failed.id())
            .bind(error)
            .bind(&IN_FLIGHT_IDS[..])
            .fetch_optional(pool)
            .await?;
        Self::resolve(pool, id, updated).await
    }

    /// List jobs newest first with an optional status filter.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        let where_clause = if params.status.is_some() {
            "WHERE status_id = $3"
        } else {
            ""
        };

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY created_at DESC, id \
             LIMIT $1 OFFSET $2"
        );

        let mut q = sqlx::query_as::<_, Job>(&query)
            .bind(params.limit)
            .bind(params.offset);
        if let Some(status) = params.status {
            q = q.bind(status.id());
        }
        q.fetch_all(pool).await
    }

    /// Count jobs matching the same filter `list` applies, ignoring paging.
    pub async fn count(pool: &PgPool, status: Option<JobStatus>) -> Result<i64, sqlx::Error> {
        match status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status_id = $1")
                    .bind(status.id())
                    .fetch_one(pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs")
                    .fetch_one(pool)
                    .await
            }
        }
    }

    /// In-flight jobs with a backend handle that have not changed for at
    /// least `stale_secs`, oldest first.
    pub async fn list_stale_in_flight(
        pool: &PgPool,
        stale_secs: f64,
        limit: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = ANY($1) \
               AND external_handle IS NOT NULL \
               AND updated_at < NOW() - make_interval(secs => $2) \
             ORDER BY updated_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&IN_FLIGHT_IDS[..])
            .bind(stale_secs)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Terminal upload jobs that finished at least `grace_secs` ago and
    /// whose artifact has not been recorded as deleted, oldest first.
    pub async fn list_pending_artifact_cleanup(
        pool: &PgPool,
        grace_secs: f64,
        limit: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = ANY($1) \
               AND file_path IS NOT NULL \
               AND artifact_deleted_at IS NULL \
               AND completed_at < NOW() - make_interval(secs => $2) \
             ORDER BY completed_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&TERMINAL_IDS[..])
            .bind(grace_secs)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Record that a job's artifact is gone. Returns `false` if it was
    /// already recorded or the job does not exist.
    pub async fn mark_artifact_deleted(pool: &PgPool, id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET artifact_deleted_at = NOW() \
             WHERE id = $1 AND artifact_deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Turn the optional row from a conditional update into an outcome,
    /// re-reading the job when nothing was updated.
    async fn resolve(
        pool: &PgPool,
        id: JobId,
        updated: Option<Job>,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        if let Some(job) = updated {
            return Ok(TransitionOutcome::Applied(job));
        }
        Ok(match Self::find_by_id(pool, id).await? {
            Some(job) => TransitionOutcome::Rejected(job),
            None => TransitionOutcome::NotFound,
        })
    }
}
