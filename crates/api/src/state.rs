use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::orchestrator::JobOrchestrator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: echo_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job lifecycle orchestrator shared by handlers and background tasks.
    pub orchestrator: Arc<JobOrchestrator>,
}
