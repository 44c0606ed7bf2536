use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AppState;

/// Upper bound on the goodbye frame; a peer that stopped reading won't take it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
use crate::error::PushError;
use crate::registry::{SubscriberId, SubscriberSink};

/// Sending half of an upgraded WebSocket, shared between the broadcast loop
/// and the connection task.
pub struct WsSink {
    tx: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    fn new(tx: SplitSink<WebSocket, Message>) -> Self {
        WsSink { tx: Mutex::new(tx) }
    }

    /// Best-effort close frame; the peer may already be gone.
    async fn close(&self) {
        let close = async {
            let mut tx = self.tx.lock().await;
            let _ = tx.send(Message::Close(None)).await;
        };
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, close).await;
    }
}

#[async_trait]
impl SubscriberSink for WsSink {
    async fn send_frame(&self, frame: Arc<str>) -> Result<(), PushError> {
        let mut tx = self.tx.lock().await;
        tx.send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| PushError::Transport(e.to_string()))
    }
}

/// GET /ws: upgrade to a push channel. No auth, no subprotocol.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection task. Subscribers only listen, so the receive side exists
/// purely to notice when the peer goes away.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let (tx, mut rx) = socket.split();
    let sink = Arc::new(WsSink::new(tx));
    let connected_at = Instant::now();

    // Cancelled by process shutdown or by the broadcast loop evicting us
    let session = state.shutdown.child_token();
    let id = state
        .registry
        .register_with_session(sink.clone(), session.clone())
        .await;
    let clients = state.registry.len().await;
    info!(subscriber = %id, clients, "New subscriber connected");

    loop {
        tokio::select! {
            _ = session.cancelled() => {
                if !state.shutdown.is_cancelled() {
                    debug!(subscriber = %id, "Evicted by broadcast loop, closing");
                }
                sink.close().await;
                break;
            }
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => log_inbound(id, &text),
                    Some(Ok(Message::Binary(data))) => {
                        debug!(subscriber = %id, bytes = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong replies are handled by the websocket layer
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(subscriber = %id, "WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // The broadcast loop may have dropped this subscriber already; that's fine
    state.registry.unregister(id).await;
    let clients = state.registry.len().await;
    info!(
        subscriber = %id,
        session = ?connected_at.elapsed(),
        clients,
        "Subscriber left"
    );
}

fn log_inbound(id: SubscriberId, text: &str) {
    if serde_json::from_str::<serde_json::Value>(text).is_ok() {
        debug!(subscriber = %id, bytes = text.len(), "Ignoring inbound message");
    } else {
        debug!(subscriber = %id, bytes = text.len(), "Ignoring non-JSON inbound message");
    }
}
