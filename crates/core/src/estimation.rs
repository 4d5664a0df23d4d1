//! Rough processing-time estimate reported back on upload.

/// Bytes of media processed per minute of backend time.
pub const BYTES_PER_MINUTE: u64 = 10 * 1024 * 1024;

/// Estimate processing time in seconds for an upload of `size_bytes`.
///
/// One minute per 10 MiB, never less than one minute.
pub fn estimate_transcription_secs(size_bytes: u64) -> u64 {
    (size_bytes / BYTES_PER_MINUTE).max(1) * 60
}
