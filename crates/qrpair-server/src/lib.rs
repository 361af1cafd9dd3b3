//! qrpair Server - Axum-based HTTP and WebSocket server
//!
//! This crate provides the web server that relays pairing sessions between
//! display clients, scanners and dashboard observers.

pub mod broadcast;
pub mod http;
pub mod router;
pub mod state;
pub mod tls;
pub mod websocket;

pub use broadcast::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use http::create_router;
pub use router::MessageRouter;
pub use state::AppState;
pub use tls::{calculate_cert_fingerprint, generate_self_signed_cert, TlsMaterial};
pub use websocket::handle_socket;
