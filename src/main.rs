//! Collate Server
//!
//! Self-hosted PDF page assembly server with ephemeral results.

use std::net::SocketAddr;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use collate_server::artifacts::ArtifactStore;
use collate_server::config::Config;
use collate_server::routes;
use collate_server::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collate_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().validated();

    tracing::info!("Starting Collate Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Artifact directory: {}", config.artifacts.dir.display());
    tracing::info!(
        "Artifact TTL: {}s (sweep every {}s)",
        config.artifacts.ttl_secs,
        config.artifacts.sweep_secs
    );

    // Initialize artifact store
    let store = ArtifactStore::new(
        config.artifacts.dir.clone(),
        chrono::Duration::seconds(config.artifacts.ttl_secs as i64),
    )
    .await
    .expect("Failed to initialize artifact store");

    // Background maintenance: TTL sweeps plus a stray-file backstop
    let sweep_task = store
        .clone()
        .start_sweep_task(std::time::Duration::from_secs(config.artifacts.sweep_secs));
    let stray_task = store.clone().start_stray_cleanup_task(
        std::time::Duration::from_secs(config.artifacts.stray_sweep_secs),
        std::time::Duration::from_secs(config.artifacts.stray_max_age_secs),
    );

    // Create application state and router
    let port = config.server.port;
    let app_state = AppState::new(config, store);
    let app = routes::app(app_state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Collate Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    sweep_task.abort();
    stray_task.abort();
    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
