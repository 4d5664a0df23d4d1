//! Poll fallback for lost webhooks.
//!
//! Every interval, in-flight jobs that have not changed for a while are
//! polled at the backend. Terminal snapshots go through
//! [`JobOrchestrator::apply_event`], the same entry point the webhook uses,
//! so a late webhook and a poll result cannot both take effect.
//!
//! Each pass also sweeps artifacts of terminal jobs whose deferred
//! deletion never ran.

use std::sync::Arc;
use std::time::Duration;

use echo_db::models::job::Job;
use echo_db::models::status::JobStatus;
use echo_db::repositories::JobRepo;
use echo_db::DbPool;
use echo_dispatch::BackendSnapshot;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::engine::orchestrator::{JobEvent, JobOrchestrator};

/// Jobs examined per pass.
const BATCH_SIZE: i64 = 50;

/// Concurrent backend polls within a pass.
const POLL_CONCURRENCY: usize = 4;

/// Run the reconciliation loop until `cancel` is triggered.
pub async fn run(
    pool: DbPool,
    orchestrator: Arc<JobOrchestrator>,
    interval: Duration,
    stale_after: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        stale_secs = stale_after.as_secs(),
        "Job reconciler started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job reconciler stopping");
                break;
            }
            _ = ticker.tick() => {
                match reconcile_once(&pool, &orchestrator, stale_after).await {
                    Ok(0) => tracing::debug!("Job reconciler: nothing to reconcile"),
                    Ok(applied) => tracing::info!(applied, "Job reconciler: applied backend states"),
                    Err(e) => tracing::error!(error = %e, "Job reconciler: pass failed"),
                }
                match orchestrator.sweep_artifacts().await {
                    Ok(0) => {}
                    Ok(cleaned) => tracing::info!(cleaned, "Job reconciler: removed leftover artifacts"),
                    Err(e) => tracing::error!(error = %e, "Job reconciler: artifact sweep failed"),
                }
            }
        }
    }
}

/// One reconciliation pass. Returns how many events were applied.
pub async fn reconcile_once(
    pool: &DbPool,
    orchestrator: &JobOrchestrator,
    stale_after: Duration,
) -> Result<usize, sqlx::Error> {
    let jobs = JobRepo::list_stale_in_flight(pool, stale_after.as_secs_f64(), BATCH_SIZE).await?;
    if jobs.is_empty() {
        return Ok(0);
    }

    let applied = stream::iter(jobs)
        .map(|job| reconcile_job(orchestrator, job))
        .buffer_unordered(POLL_CONCURRENCY)
        .filter(|applied| futures::future::ready(*applied))
        .count()
        .await;

    Ok(applied)
}

async fn reconcile_job(orchestrator: &JobOrchestrator, job: Job) -> bool {
    let Some(handle) = job.external_handle.as_deref() else {
        return false;
    };

    let blob = match orchestrator.dispatch().poll(handle).await {
        Ok(blob) => blob,
        Err(e) => {
            tracing::warn!(job_id = %job.id, run_id = %handle, error = %e, "Job reconciler: poll failed");
            return false;
        }
    };
    let snapshot = orchestrator.dispatch().snapshot(&blob);

    let Some(event) = terminal_event(&snapshot) else {
        tracing::debug!(
            job_id = %job.id,
            backend_status = snapshot.raw_status.as_deref().unwrap_or("unknown"),
            "Job reconciler: backend not finished"
        );
        return false;
    };

    match orchestrator.apply_event(job.id, event).await {
        Ok(outcome) => outcome.applied,
        Err(e) => {
            tracing::warn!(job_id = %job.id, error = %e, "Job reconciler: apply failed");
            false
        }
    }
}

/// The event a polled snapshot justifies, if any.
///
/// Only terminal states are applied. A completed run without a transcript
/// in its output is left for the webhook to deliver.
fn terminal_event(snapshot: &BackendSnapshot) -> Option<JobEvent> {
    match snapshot.status {
        JobStatus::Completed => snapshot.result.clone().map(JobEvent::Completed),
        JobStatus::Failed => Some(JobEvent::Failed(snapshot.error.clone())),
        JobStatus::Pending | JobStatus::Processing => None,
    }
}

#[cfg(test)]
mod tests {
    use echo_core::transcript::TranscriptResult;

    use super::*;

    fn snapshot(status: JobStatus) -> BackendSnapshot {
        BackendSnapshot {
            status,
            raw_status: None,
            result: None,
            error: None,
        }
    }

    #[test]
    fn in_flight_snapshots_are_not_applied() {
        assert!(terminal_event(&snapshot(JobStatus::Pending)).is_none());
        assert!(terminal_event(&snapshot(JobStatus::Processing)).is_none());
    }

    #[test]
    fn completed_without_transcript_waits_for_webhook() {
        assert!(terminal_event(&snapshot(JobStatus::Completed)).is_none());
    }

    #[test]
    fn completed_with_transcript_is_applied() {
        let mut snap = snapshot(JobStatus::Completed);
        snap.result = Some(TranscriptResult::from_parts(Some("hi".into()), None, None, None));
        assert!(matches!(terminal_event(&snap), Some(JobEvent::Completed(r)) if r.text == "hi"));
    }

    #[test]
    fn failed_carries_backend_error() {
        let mut snap = snapshot(JobStatus::Failed);
        snap.error = Some("oom".into());
        assert!(matches!(
            terminal_event(&snap),
            Some(JobEvent::Failed(Some(msg))) if msg == "oom"
        ));
    }
}
