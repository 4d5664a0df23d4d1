//! Transcript export formats (plain text, JSON, SubRip, WebVTT).
//!
//! Rendering is pure and total: any segment list, including an empty one,
//! produces output, and the same input always renders identically.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;
use crate::transcript::{join_segment_text, Segment};
use crate::types::Timestamp;

/// Header line that opens every WebVTT document.
pub const VTT_HEADER: &str = "WEBVTT";

/// Download formats accepted by `GET /transcription/{id}/download`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Txt,
    Json,
    Srt,
    Vtt,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Txt, Self::Json, Self::Srt, Self::Vtt];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    /// `Content-Type` header value for a download in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Txt => "text/plain; charset=utf-8",
            Self::Json => "application/json",
            Self::Srt => "application/x-subrip; charset=utf-8",
            Self::Vtt => "text/vtt; charset=utf-8",
        }
    }

    /// Attachment filename for a job's download.
    pub fn file_name(self, job_id: &str) -> String {
        format!("transcription_{job_id}.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == wanted)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unsupported format '{s}'. Use: txt, json, srt, vtt"
                ))
            })
    }
}

/// Everything a download can contain, borrowed from the job record.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptExport<'a> {
    pub job_id: &'a str,
    pub text: &'a str,
    pub segments: &'a [Segment],
    pub language: Option<&'a str>,
    pub duration: Option<f64>,
    pub created_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// Render a transcript in the requested format.
pub fn render(export: &TranscriptExport<'_>, format: ExportFormat) -> String {
    match format {
        ExportFormat::Txt => render_txt(export),
        ExportFormat::Json => render_json(export),
        ExportFormat::Srt => render_srt(export.segments),
        ExportFormat::Vtt => render_vtt(export.segments),
    }
}

fn render_txt(export: &TranscriptExport<'_>) -> String {
    if export.segments.is_empty() {
        export.text.to_string()
    } else {
        join_segment_text(export.segments)
    }
}

fn render_json(export: &TranscriptExport<'_>) -> String {
    // Every field is a plain string, number or timestamp, so this cannot fail.
    serde_json::to_string_pretty(export).unwrap_or_default()
}

/// SubRip: numbered cues separated by blank lines.
pub fn render_srt(segments: &[Segment]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(segments.len() * 4);
    for (index, segment) in segments.iter().enumerate() {
        lines.push((index + 1).to_string());
        lines.push(format!(
            "{} --> {}",
            format_timestamp(segment.start, ','),
            format_timestamp(segment.end, ',')
        ));
        lines.push(segment.text.trim().to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}

/// WebVTT: header, blank line, then unnumbered cues.
pub fn render_vtt(segments: &[Segment]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(2 + segments.len() * 3);
    lines.push(VTT_HEADER.to_string());
    lines.push(String::new());
    for segment in segments {
        lines.push(format!(
            "{} --> {}",
            format_timestamp(segment.start, '.'),
            format_timestamp(segment.end, '.')
        ));
        lines.push(segment.text.trim().to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Format seconds as `HH:MM:SS{sep}mmm`.
///
/// Every field is truncated, never rounded. Negative and non-finite inputs
/// render as zero.
pub fn format_timestamp(seconds: f64, separator: char) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };

    let hours = (secs / 3600.0) as u64;
    let minutes = ((secs % 3600.0) / 60.0) as u64;
    let whole_secs = (secs % 60.0) as u64;
    let millis = ((secs % 1.0) * 1000.0) as u64;

    format!("{hours:02}:{minutes:02}:{whole_secs:02}{separator}{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn export<'a>(text: &'a str, segments: &'a [Segment]) -> TranscriptExport<'a> {
        TranscriptExport {
            job_id: "job-1",
            text,
            segments,
            language: Some("en"),
            duration: Some(1.5),
            created_at: None,
            completed_at: None,
        }
    }

    // -- timestamps --

    #[test]
    fn timestamp_zero() {
        assert_eq!(format_timestamp(0.0, ','), "00:00:00,000");
    }

    #[test]
    fn timestamp_uses_requested_separator() {
        assert_eq!(format_timestamp(1.5, ','), "00:00:01,500");
        assert_eq!(format_timestamp(1.5, '.'), "00:00:01.500");
    }

    #[test]
    fn timestamp_carries_hours_and_minutes() {
        assert_eq!(format_timestamp(3723.25, ','), "01:02:03,250");
    }

    #[test]
    fn timestamp_truncates_milliseconds() {
        assert_eq!(format_timestamp(0.9999, '.'), "00:00:00.999");
    }

    #[test]
    fn timestamp_clamps_negative_and_nan() {
        assert_eq!(format_timestamp(-4.0, ','), "00:00:00,000");
        assert_eq!(format_timestamp(f64::NAN, ','), "00:00:00,000");
    }

    // -- srt / vtt --

    #[test]
    fn srt_single_segment() {
        let segments = [seg(0.0, 1.5, "hi")];
        assert_eq!(
            render_srt(&segments),
            "1\n00:00:00,000 --> 00:00:01,500\nhi\n"
        );
    }

    #[test]
    fn srt_numbers_cues_and_separates_with_blank_line() {
        let segments = [seg(0.0, 1.0, " a "), seg(1.0, 2.0, "b")];
        assert_eq!(
            render_srt(&segments),
            "1\n00:00:00,000 --> 00:00:01,000\na\n\n2\n00:00:01,000 --> 00:00:02,000\nb\n"
        );
    }

    #[test]
    fn vtt_single_segment() {
        let segments = [seg(0.0, 1.5, "hi")];
        assert_eq!(
            render_vtt(&segments),
            "WEBVTT\n\n00:00:00.000 --> 00:00:01.500\nhi\n"
        );
    }

    #[test]
    fn empty_segment_lists_render() {
        assert_eq!(render_srt(&[]), "");
        assert_eq!(render_vtt(&[]), "WEBVTT\n");
    }

    // -- txt / json --

    #[test]
    fn txt_joins_segments() {
        let segments = [seg(0.0, 1.0, "hello "), seg(1.0, 2.0, " there")];
        assert_eq!(
            render(&export("ignored", &segments), ExportFormat::Txt),
            "hello there"
        );
    }

    #[test]
    fn txt_falls_back_to_full_text() {
        assert_eq!(
            render(&export("only text", &[]), ExportFormat::Txt),
            "only text"
        );
    }

    #[test]
    fn json_includes_language_and_duration() {
        let segments = [seg(0.0, 1.5, "hi")];
        let body = render(&export("hi", &segments), ExportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["job_id"], "job-1");
        assert_eq!(value["language"], "en");
        assert_eq!(value["duration"], 1.5);
        assert_eq!(value["segments"][0]["text"], "hi");
    }

    // -- format parsing --

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("SRT".parse::<ExportFormat>().unwrap(), ExportFormat::Srt);
        assert_eq!("vtt".parse::<ExportFormat>().unwrap(), ExportFormat::Vtt);
    }

    #[test]
    fn unknown_format_is_validation_error() {
        let err = "docx".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn file_name_uses_extension() {
        assert_eq!(ExportFormat::Vtt.file_name("abc"), "transcription_abc.vtt");
    }
}
