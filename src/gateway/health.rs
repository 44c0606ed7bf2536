use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub clients_connected: usize,
    /// Time since startup as `HH:MM:SS`
    pub uptime: String,
}

/// GET / and GET /health: liveness check.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "MCP Server Running",
        clients_connected: state.registry.len().await,
        uptime: format_uptime(state.started_at.elapsed()),
    })
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
