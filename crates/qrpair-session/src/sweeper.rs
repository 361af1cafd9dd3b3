//! Periodic eviction of stale sessions

use crate::manager::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default sweep period in seconds
pub const SWEEP_INTERVAL_SECONDS: u64 = 5;

/// Default lifetime of a session whose scan never started
pub const NO_SCAN_TIMEOUT_SECONDS: u64 = 30;

/// Default idle time allowed once scanning has started
pub const INACTIVITY_TIMEOUT_SECONDS: u64 = 60;

/// When sessions are considered stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Time between sweeps
    pub interval: Duration,
    /// Evict sessions with no scanned part older than this
    pub no_scan_timeout: Duration,
    /// Evict started sessions idle for longer than this
    pub inactivity_timeout: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECONDS),
            no_scan_timeout: Duration::from_secs(NO_SCAN_TIMEOUT_SECONDS),
            inactivity_timeout: Duration::from_secs(INACTIVITY_TIMEOUT_SECONDS),
        }
    }
}

/// Background task evicting stale sessions
pub struct ExpirySweeper {
    manager: Arc<SessionManager>,
    policy: ExpiryPolicy,
}

impl ExpirySweeper {
    pub fn new(manager: Arc<SessionManager>, policy: ExpiryPolicy) -> Self {
        Self { manager, policy }
    }

    /// Run one sweep now, returning the number of evicted sessions
    pub async fn tick(&self) -> usize {
        self.manager
            .sweep_expired(&self.policy, Instant::now())
            .await
            .len()
    }

    /// Spawn the sweep loop; abort the handle to stop it
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "Expiry sweeper running every {:?} (no-scan {:?}, inactivity {:?})",
            self.policy.interval, self.policy.no_scan_timeout, self.policy.inactivity_timeout
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.policy.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                debug!("Scanning for inactive sessions...");
                self.tick().await;
            }
        })
    }
}
