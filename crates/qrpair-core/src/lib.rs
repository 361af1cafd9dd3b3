//! qrpair Core - Shared types and protocol definitions
//!
//! This crate provides the foundational types used across all qrpair components.

pub mod config;
pub mod error;
pub mod id;
pub mod protocol;

pub use config::{ConfigUpdate, PairingConfig, SharedConfig};
pub use error::{Error, Result};
pub use id::{ClientId, SessionId};
pub use protocol::{ClientMessage, Outbound, Reply, ServerEvent, SessionSummary, TimeoutReason};
