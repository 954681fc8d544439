/*
    keys.rs - Translation between local primary keys and storage keys

    The local store identifies records by integer primary keys it assigns
    itself. The sync boundary identifies them by storage keys, the canonical
    decimal encoding of those integers.
*/

use crate::core_bridge::errors::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned record identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey(pub i64);

impl PrimaryKey {
    pub fn new(value: i64) -> Self {
        PrimaryKey(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        PrimaryKey(value)
    }
}

/// Record identity at the sync boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wrap a raw string without validating it.
    ///
    /// Storage keys arriving from the remote side are untrusted; they are
    /// only checked when decoded with [`primary_key`].
    pub fn new(raw: impl Into<String>) -> Self {
        StorageKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageKey {
    fn from(raw: &str) -> Self {
        StorageKey(raw.to_string())
    }
}

impl From<PrimaryKey> for StorageKey {
    fn from(key: PrimaryKey) -> Self {
        storage_key(key)
    }
}

/// Encode a primary key as a storage key
pub fn storage_key(primary_key: PrimaryKey) -> StorageKey {
    StorageKey(primary_key.0.to_string())
}

/// Decode a storage key back into a primary key
///
/// Only the canonical encoding produced by [`storage_key`] for a positive
/// key is accepted, so the mapping stays injective: `"+7"`, `"007"`, `"0"`
/// and `"-3"` are all rejected.
pub fn primary_key(key: &StorageKey) -> BridgeResult<PrimaryKey> {
    let raw = key.as_str();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) || raw.starts_with('0') {
        return Err(BridgeError::MalformedKey(raw.to_string()));
    }

    raw.parse::<i64>()
        .map(PrimaryKey)
        .map_err(|_| BridgeError::MalformedKey(raw.to_string()))
}
