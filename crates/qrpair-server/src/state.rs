//! Shared application state

use crate::broadcast::{ConnectionHandle, ConnectionRegistry};
use crate::router::MessageRouter;
use qrpair_core::SharedConfig;
use qrpair_session::SessionManager;
use sha1::{Digest, Sha1};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Length of the public key derived from the secret key
const PUBLIC_KEY_LEN: usize = 8;

/// Shared application state
pub struct AppState {
    /// Global pairing configuration
    pub config: SharedConfig,
    /// Live WebSocket connections
    pub registry: Arc<ConnectionRegistry>,
    /// Session lifecycle owner
    pub manager: Arc<SessionManager>,
    /// Inbound message dispatch
    pub router: MessageRouter,
    /// Whether the server is reachable over TLS
    pub tls_enabled: bool,
    /// Public key published to clients
    pub public_key: String,
    /// Allowed CORS origin (`*` for any)
    pub cors_origin: String,
    /// Serve static files from this directory instead of the embedded assets
    pub public_dir: Option<PathBuf>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: SharedConfig, secret_key: &str, tls_enabled: bool) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let manager = Arc::new(SessionManager::new(config.clone(), registry.clone()));

        Self {
            config,
            registry,
            router: MessageRouter::new(manager.clone()),
            manager,
            tls_enabled,
            public_key: derive_public_key(secret_key),
            cors_origin: "*".to_string(),
            public_dir: None,
        }
    }

    /// Builder pattern: set CORS origin
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }

    /// Builder pattern: set static file directory
    pub fn with_public_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.public_dir = dir;
        self
    }

    /// Drop a closed connection and resend the session list to the rest
    pub async fn disconnect(&self, conn: &ConnectionHandle) {
        if self.registry.unregister(conn.id()) {
            debug!("Connection {} unregistered ({} open)", conn.id(), self.registry.len());
        }
        // Connection churn is shown on the dashboard
        self.manager.publish_sessions().await;
    }
}

/// Derive the short public key clients display alongside the code
///
/// First eight hex digits of the SHA-1 of the secret, so existing clients
/// keep showing the same key for the same secret.
pub fn derive_public_key(secret_key: &str) -> String {
    let digest = Sha1::digest(secret_key.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(PUBLIC_KEY_LEN);
    key
}
