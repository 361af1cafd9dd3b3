//! In-memory session store
//!
//! Keyed by session ID in insertion order; the order only matters for how
//! the dashboard lists sessions.

use crate::sweeper::ExpiryPolicy;
use indexmap::IndexMap;
use qrpair_core::{ClientId, PairingConfig, SessionId, SessionSummary, TimeoutReason};
use std::collections::HashSet;
use tokio::time::Instant;

/// One pairing attempt
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Client allowed to submit tokens for this session
    pub client_id: ClientId,
    /// Copied from the global config at creation time
    pub parts_count: u32,
    /// Copied from the global config at creation time
    pub required_tokens: u32,
    /// Valid tokens accepted so far
    pub sent_tokens: u32,
    /// Part indices observed by the scanner
    pub scanned_parts: HashSet<u32>,
    pub created_at: Instant,
    /// Last accepted progress report or validation
    pub last_activity: Instant,
}

impl Session {
    pub fn new(id: SessionId, client_id: ClientId, config: &PairingConfig, now: Instant) -> Self {
        Self {
            id,
            client_id,
            parts_count: config.parts_count,
            required_tokens: config.required_tokens,
            sent_tokens: 0,
            scanned_parts: HashSet::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Record an observed part
    pub fn record_part(&mut self, part: u32, now: Instant) {
        self.scanned_parts.insert(part);
        self.last_activity = now;
    }

    /// Decide whether this session should be evicted at `now`
    pub fn expiry(&self, policy: &ExpiryPolicy, now: Instant) -> Option<TimeoutReason> {
        if self.scanned_parts.is_empty() {
            let lifetime = now.saturating_duration_since(self.created_at);
            (lifetime > policy.no_scan_timeout).then_some(TimeoutReason::NoScanStart)
        } else {
            let idle = now.saturating_duration_since(self.last_activity);
            (idle > policy.inactivity_timeout).then_some(TimeoutReason::Inactivity)
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            client_id: self.client_id.clone(),
            sent_tokens: self.sent_tokens,
            required_tokens: self.required_tokens,
            parts_count: self.parts_count,
            scanned_parts: self.scanned_parts.len(),
        }
    }
}

/// Live sessions indexed by ID
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: IndexMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Insert a session, replacing any previous entry with the same ID
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Remove a session; removing an absent ID is a no-op
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.shift_remove(id)
    }

    /// Sessions the policy says should be evicted at `now`
    pub fn expired(&self, policy: &ExpiryPolicy, now: Instant) -> Vec<(SessionId, TimeoutReason)> {
        self.sessions
            .values()
            .filter_map(|s| s.expiry(policy, now).map(|reason| (s.id.clone(), reason)))
            .collect()
    }

    /// Summaries of all live sessions in insertion order
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions.values().map(Session::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
