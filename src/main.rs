//! pg-snapshot - dependency-ordered PostgreSQL snapshots
//!
//! Takes replayable snapshots of a schema's structure and data, and replays
//! them back into a database in one transaction.
//!
//! Connection targets are read from an env file: every `DATABASE_URL` or
//! `DATABASE_URL_<NAME>` line is a target, named after the `# comment` line
//! just above it.

mod config;
mod connection;
mod db;
mod error;
mod graph;
mod introspection;
mod maintenance;
mod models;
mod ordering;
mod render;
mod replay;
mod routes;
mod snapshot;
mod state;

use crate::config::Settings;
use crate::connection::ConnectionRegistry;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting pg-snapshot...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    // Connection targets are required before serving anything
    let connections = match ConnectionRegistry::load(&settings.env_file) {
        Ok(registry) => registry,
        Err(e) => {
            error!("❌ FATAL: {}", e);
            error!("Add at least one DATABASE_URL entry to {}", settings.env_file.display());
            return Err(e.into());
        }
    };

    for target in connections.list() {
        info!("   {} -> {} (TLS: {})", target.alias, target.display, target.tls);
    }

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    let state = Arc::new(AppState::new(settings.clone(), connections));
    info!("💾 Dump files stored under {}", state.artifacts.root().display());

    // Build the router
    let app = create_router(state, &settings);

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  /api/connections                  - List configured connections");
    info!("   GET  /api/connections/{{alias}}/tables   - Tables with their size");
    info!("   POST /api/connections/{{alias}}/snapshots - Take a snapshot (schema|data|full)");
    info!("   POST /api/connections/{{alias}}/restore  - Replay a dump file");
    info!("   POST /api/connections/{{alias}}/drop     - Drop all tables and enum types");
    info!("   POST /api/connections/{{alias}}/truncate - Truncate tables");
    info!("   GET  /api/dumps                        - List dump files");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pg_snapshot=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
