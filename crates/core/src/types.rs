/// Jobs are keyed by a random UUID that doubles as the public handle.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
