//! Job lifecycle engine.
//!
//! [`orchestrator::JobOrchestrator`] owns the state machine and is the only
//! writer of job status. It coordinates the dispatch backend, the job store,
//! the read-through [`cache`] and the on-disk [`artifacts`].

pub mod artifacts;
pub mod cache;
pub mod orchestrator;
