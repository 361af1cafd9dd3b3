//! Session lifecycle state machine
//!
//! Creation, progress tracking, token validation with replay protection,
//! completion and expiry all go through [`SessionManager`]. Every operation
//! holds the manager's write lock for its whole read-modify-write, then
//! publishes the resulting events after releasing it.

use crate::ledger::TokenLedger;
use crate::sink::EventSink;
use crate::store::{Session, SessionStore};
use crate::sweeper::ExpiryPolicy;
use qrpair_core::{
    ClientId, SessionId, SessionSummary, ServerEvent, SharedConfig, TimeoutReason,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Validation errors, reported to the submitting client
///
/// The display strings are the exact messages sent back over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found")]
    SessionNotFound,
    #[error("Client mismatch")]
    ClientMismatch,
    #[error("Token already used")]
    TokenReplayed,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Result of an accepted token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateOutcome {
    /// More tokens are required
    Partial { sent: u32, required: u32 },
    /// The session collected all required tokens and was removed
    Completed,
}

#[derive(Debug, Default)]
struct State {
    store: SessionStore,
    ledger: TokenLedger,
}

/// Owns the session store and token ledger
pub struct SessionManager {
    state: RwLock<State>,
    config: SharedConfig,
    sink: Arc<dyn EventSink>,
}

impl SessionManager {
    /// Create a manager reading session requirements from `config`
    pub fn new(config: SharedConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            config,
            sink,
        }
    }

    /// Start a new session
    ///
    /// A client ID is generated when the caller supplies none or an empty one.
    pub async fn create_session(&self, client_id: Option<ClientId>) -> (SessionId, ClientId) {
        let client_id = client_id
            .filter(|c| !c.as_str().is_empty())
            .unwrap_or_else(ClientId::generate);
        let config = self.config.get();

        let (session_id, sessions) = {
            let mut state = self.state.write().await;

            let mut session_id = SessionId::generate();
            while state.store.contains(&session_id) {
                session_id = SessionId::generate();
            }

            state.store.insert(Session::new(
                session_id.clone(),
                client_id.clone(),
                &config,
                Instant::now(),
            ));

            info!(
                "Session created: {}, client={}, parts={}, required={}",
                session_id, client_id, config.parts_count, config.required_tokens
            );
            (session_id, state.store.summaries())
        };

        self.sink.publish(ServerEvent::Sessions { sessions });
        (session_id, client_id)
    }

    /// Record that the scanner observed part `progress` of `total`
    ///
    /// Unknown sessions are ignored. Returns whether the session exists.
    pub async fn record_progress(&self, session_id: &SessionId, progress: u32, total: u32) -> bool {
        {
            let mut state = self.state.write().await;
            match state.store.get_mut(session_id) {
                Some(session) => session.record_part(progress, Instant::now()),
                None => {
                    debug!("Scan progress for unknown session {}", session_id);
                    return false;
                }
            }
        }

        debug!("Scan progress: {}/{} in session {}", progress, total, session_id);
        self.sink.publish(ServerEvent::ScanProgress {
            session_id: session_id.clone(),
            progress,
            total,
        });
        true
    }

    /// Validate a token submitted for a session
    ///
    /// The token is consumed only when the session exists, the client matches
    /// and the token was never consumed before by any session.
    pub async fn validate_token(
        &self,
        session_id: &SessionId,
        token: &str,
        client_id: &ClientId,
    ) -> SessionResult<ValidateOutcome> {
        let (outcome, events) = {
            let mut state = self.state.write().await;
            let State { store, ledger } = &mut *state;

            let session = store.get_mut(session_id).ok_or_else(|| {
                warn!("Validation for unknown session {}", session_id);
                SessionError::SessionNotFound
            })?;

            if session.client_id != *client_id {
                warn!("Client mismatch for session {}: {}", session_id, client_id);
                return Err(SessionError::ClientMismatch);
            }

            if !ledger.insert(token) {
                warn!("Replayed token rejected for session {}", session_id);
                return Err(SessionError::TokenReplayed);
            }

            session.sent_tokens += 1;
            session.last_activity = Instant::now();
            let sent = session.sent_tokens;
            let required = session.required_tokens;
            info!(
                "Session {} (client {}): token #{} accepted",
                session_id, client_id, sent
            );

            if sent >= required {
                let validated = ServerEvent::Validated {
                    session_id: session_id.clone(),
                    client_id: session.client_id.clone(),
                };
                store.remove(session_id);
                info!("Session {} validated and removed", session_id);

                let sessions = ServerEvent::Sessions {
                    sessions: store.summaries(),
                };
                (ValidateOutcome::Completed, vec![validated, sessions])
            } else {
                let sessions = ServerEvent::Sessions {
                    sessions: store.summaries(),
                };
                (ValidateOutcome::Partial { sent, required }, vec![sessions])
            }
        };

        for event in events {
            self.sink.publish(event);
        }
        Ok(outcome)
    }

    /// Snapshot of all live sessions in insertion order
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.state.read().await.store.summaries()
    }

    /// Broadcast the current session list
    pub async fn publish_sessions(&self) {
        let sessions = self.list_sessions().await;
        self.sink.publish(ServerEvent::Sessions { sessions });
    }

    /// Evict every session the policy marks as expired at `now`
    ///
    /// Publishes one timeout event per evicted session, followed by a single
    /// refreshed session list when anything was evicted.
    pub async fn sweep_expired(
        &self,
        policy: &ExpiryPolicy,
        now: Instant,
    ) -> Vec<(SessionId, TimeoutReason)> {
        let (evicted, sessions) = {
            let mut state = self.state.write().await;
            let expired = state.store.expired(policy, now);

            let evicted: Vec<_> = expired
                .into_iter()
                .filter(|(id, _)| state.store.remove(id).is_some())
                .collect();

            for (id, reason) in &evicted {
                match reason {
                    TimeoutReason::NoScanStart => {
                        info!("Session {} removed (timeout without scan start)", id)
                    }
                    TimeoutReason::Inactivity => {
                        info!("Session {} removed (timeout after inactivity)", id)
                    }
                }
            }
            debug!(
                "Sweep: {} evicted, {} live, {} tokens consumed",
                evicted.len(),
                state.store.len(),
                state.ledger.len()
            );
            (evicted, state.store.summaries())
        };

        if !evicted.is_empty() {
            for (session_id, reason) in &evicted {
                self.sink.publish(ServerEvent::SessionTimeout {
                    session_id: session_id.clone(),
                    reason: *reason,
                });
            }
            self.sink.publish(ServerEvent::Sessions { sessions });
        }
        evicted
    }

    /// Number of tokens consumed since startup
    pub async fn consumed_tokens(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    /// The configuration cell new sessions read from
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }
}
