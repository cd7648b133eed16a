use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use cronward_core::config::MAX_PAYLOAD_BYTES;
use futures_util::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::{message, send};

/// Per-connection auth state. Only meaningful when `auth.enforce` is on.
#[derive(Debug)]
pub enum ConnState {
    Anonymous,
    Authenticated { user: String },
}

/// Axum handler, upgrades HTTP to WebSocket at the control path.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection event loop. Lives for the entire WS session.
///
/// Requests are answered one at a time, in order. A `force_run_job` holds
/// this loop until the job finishes; other connections are unaffected.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    state.connections.fetch_add(1, Ordering::Relaxed);
    info!(conn_id = %conn_id, "new WS connection");

    let (mut tx, mut rx) = socket.split();
    let mut conn_state = ConnState::Anonymous;

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if text.len() > MAX_PAYLOAD_BYTES {
                    warn!(conn_id, size = text.len(), "payload too large");
                    break;
                }
                let (next, res) = message::handle(&conn_id, text.as_str(), conn_state, &state).await;
                conn_state = next;
                if send::json(&mut tx, &res).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            // pings are answered by the WebSocket layer itself
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id, error = %e, "WS read failed");
                break;
            }
        }
    }

    state.connections.fetch_sub(1, Ordering::Relaxed);
    info!(conn_id, "WS connection closed");
}
