//! Outlet for server events produced by the session manager

use qrpair_core::ServerEvent;

/// Receives events that must reach every connected observer
///
/// Implementations are best-effort fan-out and must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ServerEvent);
}
