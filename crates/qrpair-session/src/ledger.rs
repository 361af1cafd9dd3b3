//! Global set of consumed tokens
//!
//! The ledger is never pruned: it grows for the lifetime of the process,
//! one entry per accepted token. Long-lived deployments should budget
//! memory for it.

use std::collections::HashSet;

/// Tokens consumed by any session, ever
#[derive(Debug, Default)]
pub struct TokenLedger {
    consumed: HashSet<String>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a token was already consumed
    pub fn contains(&self, token: &str) -> bool {
        self.consumed.contains(token)
    }

    /// Record a token as consumed
    ///
    /// Returns `false` if it was already present; the ledger is unchanged then.
    pub fn insert(&mut self, token: &str) -> bool {
        if self.consumed.contains(token) {
            return false;
        }
        self.consumed.insert(token.to_string())
    }

    /// Number of consumed tokens
    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut ledger = TokenLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.insert("tok1"));
        assert!(!ledger.insert("tok1"));
        assert!(ledger.contains("tok1"));
        assert!(!ledger.contains("tok2"));
        assert_eq!(ledger.len(), 1);
    }
}
