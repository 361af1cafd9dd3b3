//! Inbound message dispatch
//!
//! Every decoded message from any connection goes through
//! [`MessageRouter::handle_text`]. Malformed payloads get an error reply on
//! the originating connection only; nothing is broadcast for them.

use crate::broadcast::ConnectionHandle;
use qrpair_core::{ClientMessage, Error, Reply, Result, ServerEvent};
use qrpair_session::{SessionManager, ValidateOutcome};
use std::sync::Arc;
use tracing::warn;

/// Parse one inbound text frame
pub fn parse_message(text: &str) -> Result<ClientMessage> {
    serde_json::from_str(text).map_err(|e| Error::MalformedMessage(e.to_string()))
}

/// Dispatches client messages to the session manager
pub struct MessageRouter {
    manager: Arc<SessionManager>,
}

impl MessageRouter {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Handle one raw text frame from `conn`
    pub async fn handle_text(&self, conn: &ConnectionHandle, text: &str) {
        match parse_message(text) {
            Ok(message) => self.dispatch(conn, message).await,
            Err(e) => {
                warn!("Connection {}: {} - raw: {}", conn.id(), e, text);
                conn.send(&Reply::invalid_message().into());
            }
        }
    }

    /// Run a decoded message against the session manager and reply to `conn`
    pub async fn dispatch(&self, conn: &ConnectionHandle, message: ClientMessage) {
        match message {
            ClientMessage::Init { client_id } => {
                let (session_id, _) = self.manager.create_session(client_id).await;
                conn.send(&ServerEvent::SessionInit { session_id }.into());
            }
            ClientMessage::ScanProgress {
                session_id,
                progress,
                total,
            } => {
                self.manager
                    .record_progress(&session_id, progress, total)
                    .await;
            }
            ClientMessage::Validate {
                session_id,
                full_token,
                client_id,
            } => {
                let reply = match self
                    .manager
                    .validate_token(&session_id, &full_token, &client_id)
                    .await
                {
                    Ok(ValidateOutcome::Partial { sent, required }) => {
                        Reply::partial(session_id, sent, required)
                    }
                    Ok(ValidateOutcome::Completed) => Reply::completed(session_id),
                    Err(e) => Reply::error(e.to_string()),
                };
                conn.send(&reply.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ConnectionRegistry;
    use axum::extract::ws::Message;
    use qrpair_core::{PairingConfig, SharedConfig};
    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        router: MessageRouter,
    }

    fn create_harness() -> Harness {
        let registry = Arc::new(ConnectionRegistry::new());
        let config = SharedConfig::new(PairingConfig::new().with_required_tokens(2));
        let manager = Arc::new(SessionManager::new(config, registry.clone()));
        Harness {
            registry,
            router: MessageRouter::new(manager),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Message::Text(json) = frame {
                out.push(serde_json::from_str(&json).unwrap());
            }
        }
        out
    }

    fn find<'a>(messages: &'a [Value], key: &str, value: &str) -> Option<&'a Value> {
        messages.iter().find(|m| m[key] == value)
    }

    #[tokio::test]
    async fn test_malformed_message_replies_to_sender_only() {
        let h = create_harness();
        let (sender, mut rx_sender) = h.registry.register();
        let (_observer, mut rx_observer) = h.registry.register();

        h.router.handle_text(&sender, "not json").await;
        h.router.handle_text(&sender, r#"{"action":"explode"}"#).await;
        h.router.handle_text(&sender, r#"{"action":"validate","sessionId":"s"}"#).await;

        let replies = drain(&mut rx_sender);
        assert_eq!(replies.len(), 3);
        assert!(replies
            .iter()
            .all(|r| *r == json!({"status": "error", "msg": "Invalid message"})));
        assert!(drain(&mut rx_observer).is_empty());
    }

    #[tokio::test]
    async fn test_full_pairing_exchange() {
        let h = create_harness();
        let (display, mut rx_display) = h.registry.register();
        let (scanner, mut rx_scanner) = h.registry.register();

        h.router
            .handle_text(&display, r#"{"action":"init","clientId":"phone-1"}"#)
            .await;
        let messages = drain(&mut rx_display);
        let session_id = find(&messages, "event", "session-init").unwrap()["sessionId"]
            .as_str()
            .unwrap()
            .to_string();
        let sessions = find(&messages, "event", "sessions").unwrap();
        assert_eq!(sessions["sessions"][0]["clientId"], "phone-1");
        drain(&mut rx_scanner);

        let progress = json!({"action": "scan-progress", "sessionId": session_id, "progress": 1, "total": 20});
        h.router.handle_text(&scanner, &progress.to_string()).await;
        let seen = drain(&mut rx_display);
        assert_eq!(find(&seen, "event", "scan-progress").unwrap()["progress"], 1);
        drain(&mut rx_scanner);

        let validate = |token: &str| {
            json!({"action": "validate", "sessionId": session_id, "fullToken": token, "clientId": "phone-1"})
                .to_string()
        };

        h.router.handle_text(&scanner, &validate("tok1")).await;
        let replies = drain(&mut rx_scanner);
        let partial = find(&replies, "status", "partial").unwrap();
        assert_eq!(partial["msg"], "Token 1/2 ok");
        assert_eq!(partial["sessionId"], session_id.as_str());

        h.router.handle_text(&scanner, &validate("tok1")).await;
        let replies = drain(&mut rx_scanner);
        assert_eq!(
            find(&replies, "status", "error").unwrap()["msg"],
            "Token already used"
        );

        drain(&mut rx_display);
        h.router.handle_text(&scanner, &validate("tok2")).await;
        let replies = drain(&mut rx_scanner);
        assert_eq!(
            find(&replies, "status", "ok").unwrap()["msg"],
            "All required tokens received"
        );

        let observed = drain(&mut rx_display);
        let validated = find(&observed, "event", "validated").unwrap();
        assert_eq!(validated["clientId"], "phone-1");
        assert_eq!(find(&observed, "event", "sessions").unwrap()["sessions"], json!([]));
        assert!(find(&observed, "status", "ok").is_none());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let h = create_harness();
        let (conn, mut rx) = h.registry.register();

        let unknown = json!({"action": "validate", "sessionId": "nope", "fullToken": "t", "clientId": "c"});
        h.router.handle_text(&conn, &unknown.to_string()).await;
        assert_eq!(
            find(&drain(&mut rx), "status", "error").unwrap()["msg"],
            "Session not found"
        );

        h.router.handle_text(&conn, r#"{"action":"init","clientId":"owner"}"#).await;
        let messages = drain(&mut rx);
        let session_id = find(&messages, "event", "session-init").unwrap()["sessionId"].clone();

        let mismatch = json!({"action": "validate", "sessionId": session_id, "fullToken": "t", "clientId": "other"});
        h.router.handle_text(&conn, &mismatch.to_string()).await;
        assert_eq!(
            find(&drain(&mut rx), "status", "error").unwrap()["msg"],
            "Client mismatch"
        );
    }

    #[tokio::test]
    async fn test_empty_client_id_treated_as_absent() {
        let h = create_harness();
        let (conn, mut rx) = h.registry.register();

        h.router.handle_text(&conn, r#"{"action":"init","clientId":""}"#).await;
        let messages = drain(&mut rx);
        let session_id = find(&messages, "event", "session-init").unwrap()["sessionId"].clone();
        let sessions = find(&messages, "event", "sessions").unwrap();
        let client_id = sessions["sessions"][0]["clientId"].as_str().unwrap();
        assert_eq!(client_id.len(), 12);

        let validate = json!({"action": "validate", "sessionId": session_id, "fullToken": "t", "clientId": ""});
        h.router.handle_text(&conn, &validate.to_string()).await;
        assert_eq!(
            find(&drain(&mut rx), "status", "error").unwrap()["msg"],
            "Client mismatch"
        );
    }

    #[tokio::test]
    async fn test_progress_for_unknown_session_is_silent() {
        let h = create_harness();
        let (conn, mut rx) = h.registry.register();

        let progress = json!({"action": "scan-progress", "sessionId": "ghost", "progress": 2, "total": 20});
        h.router.handle_text(&conn, &progress.to_string()).await;
        assert!(drain(&mut rx).is_empty());
    }
}
