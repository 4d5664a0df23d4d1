//! Domain types and pure logic for the Echo transcription service.
//!
//! Nothing in this crate performs I/O. Transcript rendering, input
//! validation and processing-time estimation live here so the database,
//! dispatch and API crates share one definition of each rule.

pub mod error;
pub mod estimation;
pub mod export;
pub mod language;
pub mod naming;
pub mod transcript;
pub mod types;
