//! Artifact file naming.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::JobId;

/// Longest extension (without the dot) carried over from an upload.
const MAX_EXTENSION_LEN: usize = 10;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s.-]").expect("static regex is valid")
});

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("static regex is valid"));

/// Strip characters that are unsafe in file names and collapse runs of
/// spaces and dashes into a single underscore.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(filename, "");
    let collapsed = SEPARATORS.replace_all(&cleaned, "_");
    collapsed.trim_matches('_').trim().to_string()
}

/// Lowercase extension of an uploaded file name, including the dot.
///
/// Returns an empty string when there is no usable extension.
pub fn upload_extension(original: Option<&str>) -> String {
    let Some(name) = original else {
        return String::new();
    };
    let name = sanitize_filename(name);
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Name of the stored artifact for a job: `{job_id}{.ext}`.
pub fn artifact_file_name(job_id: JobId, original: Option<&str>) -> String {
    format!("{job_id}{}", upload_extension(original))
}
