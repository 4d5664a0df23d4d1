//! Backend callback routes (root level, not under `/api/v1`).

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// ```text
/// POST   /webhooks/transcription          -> transcription_webhook
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/webhooks/transcription",
        post(webhooks::transcription_webhook),
    )
}
