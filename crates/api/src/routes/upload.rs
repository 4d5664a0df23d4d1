//! Route definitions for job intake.

use axum::routing::post;
use axum::Router;

use crate::handlers::upload;
use crate::state::AppState;

/// Routes mounted at `/upload`.
///
/// ```text
/// POST   /file            -> upload_file
/// POST   /url             -> upload_url
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/file", post(upload::upload_file))
        .route("/url", post(upload::upload_url))
}
