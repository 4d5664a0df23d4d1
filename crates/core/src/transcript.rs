//! Transcript result types shared by the job store, the dispatch backend
//! and the export formatter.

use serde::{Deserialize, Serialize};

/// One timed span of recognised speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in seconds.
    #[serde(default)]
    pub start: f64,
    /// End offset in seconds.
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

/// The write-once result bundle attached to a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub segments: Vec<Segment>,
    /// Language detected by the backend, if reported.
    pub language: Option<String>,
    /// Media duration in seconds, if reported.
    pub duration: Option<f64>,
}

impl TranscriptResult {
    /// Build a result from the loose fields a backend reports.
    ///
    /// When the backend omits the full text it is rebuilt from the segment
    /// texts so downloads always have something to render.
    pub fn from_parts(
        text: Option<String>,
        segments: Option<Vec<Segment>>,
        language: Option<String>,
        duration: Option<f64>,
    ) -> Self {
        let segments = segments.unwrap_or_default();
        let text = match text {
            Some(text) => text,
            None => join_segment_text(&segments),
        };
        Self {
            text,
            segments,
            language,
            duration,
        }
    }
}

/// Concatenate trimmed segment texts with single spaces, skipping blanks.
pub fn join_segment_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
