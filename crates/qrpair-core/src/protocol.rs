//! WebSocket protocol message types

use crate::config::PairingConfig;
use crate::id::{ClientId, SessionId};
use serde::{Deserialize, Serialize};

/// Messages sent from a display or scanner client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Start a new pairing session
    Init {
        /// Client identifier; generated by the server when absent
        #[serde(default)]
        client_id: Option<ClientId>,
    },
    /// Scanner observed one part of the rotating code
    ScanProgress {
        session_id: SessionId,
        /// Index of the observed part
        progress: u32,
        /// Total parts the scanner expects
        total: u32,
    },
    /// Scanner submits a token derived from the observed parts
    Validate {
        session_id: SessionId,
        full_token: String,
        client_id: ClientId,
    },
}

/// Why the sweeper evicted a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutReason {
    /// No part was ever scanned
    NoScanStart,
    /// Scanning started but stalled
    Inactivity,
}

impl std::fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutReason::NoScanStart => f.write_str("no-scan-start"),
            TimeoutReason::Inactivity => f.write_str("inactivity"),
        }
    }
}

/// Dashboard view of one live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub client_id: ClientId,
    pub sent_tokens: u32,
    pub required_tokens: u32,
    pub parts_count: u32,
    /// Number of distinct parts scanned so far
    pub scanned_parts: usize,
}

/// Events pushed by the server, either to one client or to all of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Reply to `init` carrying the new session ID
    SessionInit { session_id: SessionId },
    /// Full list of live sessions
    Sessions { sessions: Vec<SessionSummary> },
    /// Global configuration changed
    ConfigUpdate { config: PairingConfig },
    /// A scanner reported progress
    ScanProgress {
        session_id: SessionId,
        progress: u32,
        total: u32,
    },
    /// A session collected all required tokens
    Validated {
        session_id: SessionId,
        client_id: ClientId,
    },
    /// A session was evicted by the sweeper
    SessionTimeout {
        session_id: SessionId,
        reason: TimeoutReason,
    },
}

/// Direct replies to a `validate` request or a malformed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Reply {
    Error {
        msg: String,
    },
    Partial {
        msg: String,
        session_id: SessionId,
    },
    Ok {
        msg: String,
        session_id: SessionId,
    },
}

impl Reply {
    /// Error reply with the given message
    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error { msg: msg.into() }
    }

    /// Reply for payloads that could not be parsed
    pub fn invalid_message() -> Self {
        Reply::error("Invalid message")
    }

    /// A token was accepted but more are required
    pub fn partial(session_id: SessionId, sent: u32, required: u32) -> Self {
        Reply::Partial {
            msg: format!("Token {}/{} ok", sent, required),
            session_id,
        }
    }

    /// All required tokens were received
    pub fn completed(session_id: SessionId) -> Self {
        Reply::Ok {
            msg: "All required tokens received".to_string(),
            session_id,
        }
    }
}

/// Anything the server writes to a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Event(ServerEvent),
    Reply(Reply),
}

impl From<ServerEvent> for Outbound {
    fn from(event: ServerEvent) -> Self {
        Outbound::Event(event)
    }
}

impl From<Reply> for Outbound {
    fn from(reply: Reply) -> Self {
        Outbound::Reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_init_without_client() {
        let msg: ClientMessage = serde_json::from_str(r#"{"action":"init"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Init { client_id: None });
    }

    #[test]
    fn test_parse_validate() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"action":"validate","sessionId":"s1","fullToken":"tok","clientId":"c1"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Validate {
                session_id: SessionId::from("s1"),
                full_token: "tok".to_string(),
                client_id: ClientId::from("c1"),
            }
        );
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"validate","sessionId":"s1"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"sessionId":"s1"}"#).is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let event = ServerEvent::SessionTimeout {
            session_id: SessionId::from("s1"),
            reason: TimeoutReason::NoScanStart,
        };
        assert_eq!(
            serde_json::to_value(Outbound::from(event)).unwrap(),
            json!({"event": "session-timeout", "sessionId": "s1", "reason": "no-scan-start"})
        );

        let progress = ServerEvent::ScanProgress {
            session_id: SessionId::from("s1"),
            progress: 3,
            total: 20,
        };
        assert_eq!(
            serde_json::to_value(progress).unwrap(),
            json!({"event": "scan-progress", "sessionId": "s1", "progress": 3, "total": 20})
        );
    }

    #[test]
    fn test_reply_wire_format() {
        let partial = Reply::partial(SessionId::from("s1"), 1, 2);
        assert_eq!(
            serde_json::to_value(Outbound::from(partial)).unwrap(),
            json!({"status": "partial", "msg": "Token 1/2 ok", "sessionId": "s1"})
        );
        assert_eq!(
            serde_json::to_value(Reply::error("Client mismatch")).unwrap(),
            json!({"status": "error", "msg": "Client mismatch"})
        );
    }

    #[test]
    fn test_sessions_event_fields() {
        let event = ServerEvent::Sessions {
            sessions: vec![SessionSummary {
                session_id: SessionId::from("s1"),
                client_id: ClientId::from("c1"),
                sent_tokens: 1,
                required_tokens: 2,
                parts_count: 20,
                scanned_parts: 4,
            }],
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["event"], "sessions");
        assert_eq!(value["sessions"][0]["sentTokens"], 1);
        assert_eq!(value["sessions"][0]["clientId"], "c1");
    }
}
