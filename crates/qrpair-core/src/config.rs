//! Configuration types for qrpair

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, RwLock};

/// Process-wide pairing configuration
///
/// Sessions copy `parts_count` and `required_tokens` at creation time, so
/// later changes only affect sessions created afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingConfig {
    /// Number of distinct code parts the scanner has to observe
    pub parts_count: u32,
    /// Number of distinct valid tokens needed to complete a session
    pub required_tokens: u32,
    /// Restrict a token to a single client
    pub single_client_only: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            parts_count: 20,
            required_tokens: 2,
            single_client_only: false,
        }
    }
}

impl PairingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set parts count
    pub fn with_parts_count(mut self, parts_count: u32) -> Self {
        self.parts_count = parts_count;
        self
    }

    /// Builder pattern: set required tokens
    pub fn with_required_tokens(mut self, required_tokens: u32) -> Self {
        self.required_tokens = required_tokens;
        self
    }

    /// Builder pattern: set single client mode
    pub fn with_single_client_only(mut self, single_client_only: bool) -> Self {
        self.single_client_only = single_client_only;
        self
    }

    /// Check that every count is at least one
    ///
    /// A session requiring zero tokens would be complete the moment it is
    /// created.
    pub fn validate(&self) -> Result<()> {
        if self.parts_count == 0 {
            return Err(Error::Config("partsCount must be at least 1".to_string()));
        }
        if self.required_tokens == 0 {
            return Err(Error::Config("requiredTokens must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Merge a partial update into this configuration
    ///
    /// Missing fields and zero counts leave the current value untouched.
    pub fn merge(&mut self, update: &ConfigUpdate) {
        if let Some(parts) = update.parts_count.filter(|n| *n > 0) {
            self.parts_count = parts;
        }
        if let Some(required) = update.required_tokens.filter(|n| *n > 0) {
            self.required_tokens = required;
        }
        if let Some(single) = update.single_client_only {
            self.single_client_only = single;
        }
    }
}

/// Partial configuration update as posted to the configuration endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default, deserialize_with = "lenient_count")]
    pub parts_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub required_tokens: Option<u32>,
    #[serde(default)]
    pub single_client_only: Option<bool>,
}

/// Accept counts sent either as JSON numbers or as numeric strings
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(n)) => Ok(Some(n)),
        Some(Count::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid count: {}", s))),
    }
}

/// Shared, synchronized configuration cell
///
/// Readers always observe one consistent `PairingConfig` value.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<PairingConfig>>,
}

impl SharedConfig {
    /// Create a cell holding the given configuration
    pub fn new(config: PairingConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Get a copy of the current configuration
    pub fn get(&self) -> PairingConfig {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Apply a partial update and return the resulting configuration
    pub fn apply(&self, update: &ConfigUpdate) -> PairingConfig {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.merge(update);
        *guard
    }
}
