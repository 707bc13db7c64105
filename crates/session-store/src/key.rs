//! RecordKey: filesystem-safe name for an entity's session record.
//!
//! Entity names are arbitrary strings (`sales_Order`, `app$Customer`, ...), so
//! the file backend names records by a BLAKE3 digest of the entity name,
//! truncated to 128 bits (32 hex chars) and sharded by its first two chars.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A record key - 128 bits (16 bytes, 32 hex chars) of BLAKE3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

/// Errors that can occur when parsing record keys.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key length: expected 32 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in key")]
    InvalidHex,
}

impl RecordKey {
    /// Derive the key for an entity name.
    pub fn for_entity(entity_name: &str) -> Self {
        let hash_bytes = blake3::hash(entity_name.as_bytes());
        Self(hex::encode(&hash_bytes.as_bytes()[..16]))
    }

    /// First 2 characters (directory shard).
    pub fn prefix(&self) -> &str {
        &self.0[0..2]
    }

    /// Remainder after the prefix (file stem).
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(KeyError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KeyError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_entity_produces_32_hex_chars() {
        let key = RecordKey::for_entity("sales_Order");
        assert_eq!(key.as_str().len(), 32);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_for_entity_is_deterministic() {
        assert_eq!(
            RecordKey::for_entity("app$Customer"),
            RecordKey::for_entity("app$Customer")
        );
        assert_ne!(
            RecordKey::for_entity("app$Customer"),
            RecordKey::for_entity("app$customer")
        );
    }

    #[test]
    fn test_prefix_and_remainder() {
        let key = RecordKey::for_entity("test");
        assert_eq!(key.prefix().len(), 2);
        assert_eq!(key.remainder().len(), 30);
        assert_eq!(format!("{}{}", key.prefix(), key.remainder()), key.as_str());
    }

    #[test]
    fn test_from_str() {
        let key = RecordKey::for_entity("parse me");
        let parsed: RecordKey = key.as_str().parse().unwrap();
        assert_eq!(parsed, key);

        assert!(matches!("short".parse::<RecordKey>(), Err(KeyError::InvalidLength(5))));
        assert!(matches!(
            "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz".parse::<RecordKey>(),
            Err(KeyError::InvalidHex)
        ));
    }
}
