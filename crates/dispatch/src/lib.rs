//! Client library for the out-of-process transcription backend.
//!
//! [`client::DispatchClient`] is the capability set the orchestrator
//! relies on (submit, poll, cancel). [`trigger::TriggerClient`] implements
//! it over the Trigger.dev runs API. Backend status vocabularies are
//! translated to [`echo_db::models::status::JobStatus`] by a fixed table in
//! [`status`].

pub mod client;
pub mod status;
pub mod trigger;

pub use client::{BackendSnapshot, DispatchClient, DispatchError, MediaLocator, SubmitRequest};
