//! Query parameter types for API handlers.

use echo_core::error::CoreError;
use echo_core::export::ExportFormat;
use echo_db::models::job::JobListQuery;
use echo_db::models::status::JobStatus;
use serde::Deserialize;

pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 100;

/// `GET /transcriptions?status=&limit=&offset=`.
///
/// Out-of-range values are rejected rather than clamped.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    pub fn validate(&self) -> Result<JobListQuery, CoreError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(CoreError::Validation(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}"
            )));
        }

        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(CoreError::Validation("offset must not be negative".into()));
        }

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.to_ascii_lowercase().parse::<JobStatus>()?),
        };

        Ok(JobListQuery {
            status,
            limit,
            offset,
        })
    }
}

/// `GET /transcription/{id}/download?format=`.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    pub format: Option<String>,
}

impl DownloadParams {
    pub fn format(&self) -> Result<ExportFormat, CoreError> {
        match self.format.as_deref() {
            None | Some("") => Ok(ExportFormat::default()),
            Some(s) => s.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(status: Option<&str>, limit: Option<i64>, offset: Option<i64>) -> ListParams {
        ListParams {
            status: status.map(str::to_string),
            limit,
            offset,
        }
    }

    #[test]
    fn list_defaults() {
        let q = ListParams::default().validate().unwrap();
        assert_eq!(q.limit, 10);
        assert_eq!(q.offset, 0);
        assert!(q.status.is_none());
    }

    #[test]
    fn list_limit_bounds() {
        assert!(params(None, Some(0), None).validate().is_err());
        assert!(params(None, Some(101), None).validate().is_err());
        assert_eq!(params(None, Some(100), None).validate().unwrap().limit, 100);
        assert!(params(None, None, Some(-1)).validate().is_err());
    }

    #[test]
    fn list_status_is_case_insensitive() {
        let q = params(Some("FAILED"), None, None).validate().unwrap();
        assert_eq!(q.status, Some(JobStatus::Failed));
        assert!(params(Some("archived"), None, None).validate().is_err());
    }

    #[test]
    fn download_format_defaults_to_txt() {
        assert_eq!(DownloadParams::default().format().unwrap(), ExportFormat::Txt);
        let srt = DownloadParams {
            format: Some("srt".into()),
        };
        assert_eq!(srt.format().unwrap(), ExportFormat::Srt);
        let bad = DownloadParams {
            format: Some("docx".into()),
        };
        assert!(bad.format().is_err());
    }
}
