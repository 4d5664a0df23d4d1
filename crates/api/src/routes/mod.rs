pub mod health;
pub mod transcription;
pub mod upload;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /upload/file                                     multipart upload (POST)
/// /upload/url                                      remote media URL (POST)
///
/// /transcription/{id}                              get, cancel (DELETE)
/// /transcription/{id}/download                     rendered transcript
/// /transcriptions                                  list
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/upload", upload::router())
        .merge(transcription::router())
}
