use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod broadcast;
mod config;
mod error;
mod feeds;
mod gateway;
mod registry;
mod snapshot;

use broadcast::Broadcaster;
use config::Config;
use feeds::Feeds;
use gateway::AppState;
use registry::SubscriberRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if !config.has_api_key() {
        warn!("RAPIDAPI_KEY not set – feeds will broadcast empty lists");
    }

    let feeds = Feeds::rapidapi(&config)?;
    let registry = SubscriberRegistry::new();
    let shutdown = CancellationToken::new();

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {:?}", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Gateway listening on ws://{}/ws", addr);

    // Broadcast loop runs independently of any subscriber
    let broadcaster = Broadcaster::new(feeds, registry.clone(), config.broadcast_settings());
    let broadcast_task = broadcaster.spawn(shutdown.clone());
    info!(
        "Broadcasting every {}s after each cycle",
        config.broadcast_interval_secs
    );

    let app = gateway::router(AppState {
        registry,
        started_at: Instant::now(),
        shutdown: shutdown.clone(),
    });

    let serve_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            serve_shutdown.cancel();
        })
        .await;

    // Stop the loop even if the server exited on its own
    shutdown.cancel();
    if let Err(e) = broadcast_task.await {
        error!("Broadcast task ended abnormally: {}", e);
    }

    served.context("Gateway server failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
