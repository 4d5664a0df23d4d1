//! Route definitions for the transcription resources.

use axum::routing::get;
use axum::Router;

use crate::handlers::transcription;
use crate::state::AppState;

/// ```text
/// GET    /transcription/{id}              -> get_transcription
/// DELETE /transcription/{id}              -> cancel_transcription
/// GET    /transcription/{id}/download     -> download_transcription
/// GET    /transcriptions                  -> list_transcriptions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/transcription/{id}",
            get(transcription::get_transcription).delete(transcription::cancel_transcription),
        )
        .route(
            "/transcription/{id}/download",
            get(transcription::download_transcription),
        )
        .route("/transcriptions", get(transcription::list_transcriptions))
}
