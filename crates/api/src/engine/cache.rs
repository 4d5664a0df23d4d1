//! Best-effort read-through cache for job projections.
//!
//! The database stays authoritative. Only terminal jobs are cached, since
//! they can no longer change; an entry is therefore never stale, only
//! missing.

use std::sync::Arc;
use std::time::Duration;

use echo_core::types::JobId;
use echo_db::models::job::Job;
use moka::sync::Cache;

/// Storage behind [`JobCacheHandle`].
pub trait JobCache: Send + Sync {
    fn get(&self, id: JobId) -> Option<Job>;
    fn put(&self, job: Job);
}

/// In-process TTL cache.
pub struct MokaJobCache {
    inner: Cache<JobId, Job>,
}

impl MokaJobCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }
}

impl JobCache for MokaJobCache {
    fn get(&self, id: JobId) -> Option<Job> {
        self.inner.get(&id)
    }

    fn put(&self, job: Job) {
        self.inner.insert(job.id, job);
    }
}

/// Optional cache. Every operation is a no-op when disabled.
#[derive(Clone, Default)]
pub struct JobCacheHandle(Option<Arc<dyn JobCache>>);

impl JobCacheHandle {
    pub fn new(cache: Arc<dyn JobCache>) -> Self {
        Self(Some(cache))
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        let hit = self.0.as_ref()?.get(id);
        if hit.is_some() {
            tracing::debug!(job_id = %id, "Job cache hit");
        }
        hit
    }

    /// Cache a job if it is terminal; non-terminal jobs are ignored.
    pub fn put(&self, job: &Job) {
        let Some(cache) = &self.0 else {
            return;
        };
        if job.is_terminal() {
            cache.put(job.clone());
        }
    }
}
