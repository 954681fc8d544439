/*
    errors.rs - Error types for the sync bridge

    Every failure surfaced from merge/apply is one of:
    - a storage key that does not decode to a primary key
    - a storage key with no resident record
    - a local-store transaction that could not complete
    - a bookkeeping write that could not be persisted
*/

use thiserror::Error;

/// Errors that can occur while reconciling the local store with the
/// remote change processor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Storage key is not a valid encoding of a primary key
    #[error("Malformed storage key: {0:?}")]
    MalformedKey(String),

    /// Update/Delete references a storage key with no resident record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local store operation or transaction failed
    #[error("Store failure: {0}")]
    StoreFailure(String),

    /// Sync metadata could not be written
    #[error("Metadata persist failure: {0}")]
    MetadataPersistFailure(String),

    /// Remote change is missing data it must carry
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        BridgeError::StoreFailure(err.to_string())
    }
}

impl From<bincode::Error> for BridgeError {
    fn from(err: bincode::Error) -> Self {
        BridgeError::MetadataPersistFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::NotFound("1000".to_string());
        assert_eq!(err.to_string(), "Not found: 1000");

        let err = BridgeError::MalformedKey("abc".to_string());
        assert_eq!(err.to_string(), "Malformed storage key: \"abc\"");
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let sql_err = rusqlite::Error::QueryReturnedNoRows;
        let err: BridgeError = sql_err.into();
        assert!(matches!(err, BridgeError::StoreFailure(_)));
    }

    #[test]
    fn test_bincode_error_conversion() {
        let bad: Result<String, bincode::Error> = bincode::deserialize(&[0xff]);
        let err: BridgeError = bad.unwrap_err().into();
        assert!(matches!(err, BridgeError::MetadataPersistFailure(_)));
    }
}
