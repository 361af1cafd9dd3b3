//! WebSocket connection handling
//!
//! Each connection is split into a reader loop feeding the message router
//! and a writer task draining the connection's outbound queue.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection until it closes
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbound_rx) = state.registry.register();

    info!(
        "WebSocket connection {} opened ({} open)",
        conn.id(),
        state.registry.len()
    );

    let conn_id = conn.id();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sender.send(frame).await.is_err() {
                debug!("Connection {}: send failed, client disconnected", conn_id);
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.router.handle_text(&conn, &text).await;
            }
            Ok(Message::Ping(data)) => {
                if !conn.send_frame(Message::Pong(data)) {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!("Connection {}: receive error: {}", conn.id(), e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.disconnect(&conn).await;
    info!("WebSocket connection {} closed", conn.id());
}
