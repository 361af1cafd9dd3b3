//! qrpair Session - Pairing session lifecycle
//!
//! Tracks concurrent pairing attempts, validates submitted tokens against
//! per-session requirements with global replay protection, and reaps
//! sessions that stall or never start.
//!
//! # Session Flow
//!
//! 1. A display client sends `init`; `SessionManager::create_session()` registers a session
//! 2. The scanner reports parts it has seen via `record_progress()`
//! 3. The scanner submits derived tokens via `validate_token()`
//! 4. Once `required_tokens` distinct tokens are accepted the session completes and is removed
//! 5. `ExpirySweeper` evicts sessions that never started or went idle
//!
//! All mutations go through one lock inside the manager. Events are handed to
//! an [`EventSink`] after the lock is released.
//!
//! # Example
//!
//! ```no_run
//! use qrpair_core::SharedConfig;
//! use qrpair_session::{EventSink, ExpiryPolicy, ExpirySweeper, SessionManager};
//! use std::sync::Arc;
//!
//! async fn example(sink: Arc<dyn EventSink>) {
//!     let manager = Arc::new(SessionManager::new(SharedConfig::default(), sink));
//!     let _sweeper = ExpirySweeper::new(manager.clone(), ExpiryPolicy::default()).spawn();
//!
//!     let (session_id, client_id) = manager.create_session(None).await;
//!     let outcome = manager.validate_token(&session_id, "token", &client_id).await;
//!     println!("{:?}", outcome);
//! }
//! ```

pub mod ledger;
pub mod manager;
pub mod sink;
pub mod store;
pub mod sweeper;

pub use ledger::TokenLedger;
pub use manager::{SessionError, SessionManager, SessionResult, ValidateOutcome};
pub use sink::EventSink;
pub use store::{Session, SessionStore};
pub use sweeper::{ExpiryPolicy, ExpirySweeper};
