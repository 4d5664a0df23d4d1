pub mod transcription;
pub mod upload;
pub mod webhooks;

use echo_core::error::CoreError;
use echo_core::types::JobId;

use crate::error::AppError;

/// Parse a job ID from a path or payload.
///
/// A malformed ID cannot name any job, so it is reported as not found.
pub(crate) fn parse_job_id(raw: &str) -> Result<JobId, AppError> {
    raw.trim().parse::<JobId>().map_err(|_| {
        AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: raw.to_string(),
        })
    })
}
