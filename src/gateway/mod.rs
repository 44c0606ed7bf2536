pub mod health;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::registry::SubscriberRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: SubscriberRegistry,
    pub started_at: Instant,
    /// Fired on process shutdown; ends every subscriber's receive loop
    pub shutdown: CancellationToken,
}

/// Build the Axum router for the push gateway.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health_handler))
        .route("/health", get(health::health_handler))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}
