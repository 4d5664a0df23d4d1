use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use echo_api::background::reconciler;
use echo_api::config::ServerConfig;
use echo_api::engine::artifacts::ArtifactStore;
use echo_api::engine::cache::{JobCacheHandle, MokaJobCache};
use echo_api::engine::orchestrator::JobOrchestrator;
use echo_api::router::build_app_router;
use echo_api::state::AppState;
use echo_dispatch::trigger::TriggerClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "echo_api=debug,echo_dispatch=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = echo_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    echo_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    echo_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Artifact store ---
    let artifacts = ArtifactStore::open(
        &config.artifacts.upload_dir,
        config.artifacts.public_base_url.clone(),
        Duration::from_secs(config.artifacts.delete_grace_secs),
    )
    .await
    .expect("Failed to open upload directory");
    tracing::info!(root = %artifacts.root().display(), "Artifact store ready");

    // --- Job cache ---
    let cache = if config.cache.enabled {
        JobCacheHandle::new(Arc::new(MokaJobCache::new(
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_entries,
        )))
    } else {
        tracing::info!("Job cache disabled");
        JobCacheHandle::disabled()
    };

    // --- Dispatch backend ---
    if config.dispatch.api_key.is_empty() {
        tracing::warn!("DISPATCH_API_KEY is not set; submissions will be rejected by the backend");
    }
    let dispatch = TriggerClient::new(config.dispatch.trigger())
        .expect("Failed to build dispatch HTTP client");
    tracing::info!(base_url = %config.dispatch.base_url, task = %config.dispatch.task_id, "Dispatch client created");

    // --- Orchestrator ---
    let orchestrator = Arc::new(JobOrchestrator::new(
        pool.clone(),
        Arc::new(dispatch),
        cache,
        artifacts,
        config.default_webhook_url(),
        Duration::from_secs(config.dispatch.cancel_timeout_secs),
    ));

    // Pick up artifact deletions a previous run left pending.
    match orchestrator.sweep_artifacts().await {
        Ok(cleaned) => tracing::info!(cleaned, "Startup artifact sweep complete"),
        Err(e) => tracing::error!(error = %e, "Startup artifact sweep failed"),
    }

    // --- Poll reconciler ---
    let reconcile_cancel = CancellationToken::new();
    let reconcile_handle = if config.reconcile.interval_secs > 0 {
        Some(tokio::spawn(reconciler::run(
            pool.clone(),
            Arc::clone(&orchestrator),
            Duration::from_secs(config.reconcile.interval_secs),
            Duration::from_secs(config.reconcile.stale_secs),
            reconcile_cancel.clone(),
        )))
    } else {
        tracing::info!("Job reconciler disabled");
        None
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    reconcile_cancel.cancel();
    if let Some(handle) = reconcile_handle {
        let _ = tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), handle).await;
        tracing::info!("Job reconciler stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
