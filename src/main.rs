//! Arena Sync Server - entry point
//!
//! Loads configuration, starts the WebSocket listener and the position
//! broadcast loop, and drains connections on SIGINT/SIGTERM.

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_sync_server::app::{self, AppState};
use arena_sync_server::config::Config;
use arena_sync_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Arena Sync Server");
    info!(
        broadcast_hz = config.broadcast_hz,
        spawn_half_extent = config.game.spawn_half_extent,
        "Arena configured"
    );

    let state = AppState::new(config.clone());

    // Start server
    let addr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let mut server = tokio::spawn(app::serve(listener, state.clone()));

    tokio::select! {
        _ = shutdown_signal() => {}
        joined = &mut server => {
            joined??;
            return Ok(());
        }
    }

    state.shutdown.trigger();

    if !app::drain(&state, config.shutdown_grace).await {
        warn!(
            open = state.open_sockets(),
            "Grace period elapsed, force-closing remaining connections"
        );
        state.arena().close_all();
    }

    if tokio::time::timeout(config.shutdown_grace, server).await.is_err() {
        warn!("Listener did not stop within the grace period");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
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
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
