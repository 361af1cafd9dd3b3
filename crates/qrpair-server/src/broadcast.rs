//! Connection registry and fan-out to connected clients

use axum::extract::ws::Message;
use qrpair_core::{Outbound, ServerEvent};
use qrpair_session::EventSink;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Identifier of a live WebSocket connection
pub type ConnectionId = u64;

/// Sending half of one connection
///
/// Frames are queued on an unbounded channel drained by the connection's
/// writer task. Once that task exits the handle reports itself closed.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the writer side is still accepting frames
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Serialize and queue a message; returns false if the connection is gone
    pub fn send(&self, message: &Outbound) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.send_frame(Message::Text(json)),
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                false
            }
        }
    }

    /// Queue a raw frame
    pub fn send_frame(&self, frame: Message) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Tracks all open connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection
    ///
    /// Returns its handle and the receiver the writer task drains.
    pub fn register(&self) -> (ConnectionHandle, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle { id, tx };

        if let Ok(mut guard) = self.connections.write() {
            guard.insert(id, handle.clone());
        }
        (handle, rx)
    }

    /// Forget a connection; returns whether it was registered
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.connections
            .write()
            .map(|mut guard| guard.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// Send a message to every open connection
    ///
    /// The message is serialized once. Connections that are not open are
    /// skipped. Returns the number of connections it was queued for.
    pub fn broadcast_all(&self, message: &Outbound) -> usize {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize broadcast: {}", e);
                return 0;
            }
        };

        let Ok(guard) = self.connections.read() else {
            return 0;
        };
        let delivered = guard
            .values()
            .filter(|conn| conn.is_open())
            .filter(|conn| conn.send_frame(Message::Text(json.clone())))
            .count();

        debug!("Broadcast to {}/{} connections", delivered, guard.len());
        delivered
    }

    /// Send a message to one connection
    pub fn send_one(&self, id: ConnectionId, message: &Outbound) -> bool {
        let handle = self
            .connections
            .read()
            .ok()
            .and_then(|guard| guard.get(&id).cloned());

        match handle {
            Some(handle) => handle.send(message),
            None => false,
        }
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for ConnectionRegistry {
    fn publish(&self, event: ServerEvent) {
        self.broadcast_all(&Outbound::Event(event));
    }
}
