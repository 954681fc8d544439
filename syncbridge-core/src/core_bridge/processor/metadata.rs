/*
    metadata.rs - Sync bookkeeping owned by the change processor

    The bridge persists these values and hands them back on startup, but it
    never interprets them. The only exception is ModelState::initial_sync_done,
    which the merge engine sets once the first full reconciliation succeeds.
*/

use crate::core_bridge::keys::StorageKey;
use crate::core_bridge::model::EntityData;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Per-record sync state, stored under the record's storage key
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub client_tag_hash: String,
    pub server_id: String,
    pub server_version: i64,
    pub sequence_number: i64,
    pub acked_sequence_number: i64,
    pub specifics_hash: String,
    pub creation_time: i64,
    pub modification_time: i64,
    pub is_deleted: bool,
}

impl EntityMetadata {
    /// Metadata for an entity whose current version came from the server
    pub fn from_remote(data: &EntityData) -> Self {
        EntityMetadata {
            client_tag_hash: data.client_tag_hash.clone(),
            server_id: data.id.clone(),
            specifics_hash: specifics_hash(data),
            creation_time: data.creation_time,
            modification_time: data.modification_time,
            ..Default::default()
        }
    }
}

fn specifics_hash(data: &EntityData) -> String {
    let bytes = bincode::serialize(&data.specifics).unwrap_or_default();
    STANDARD.encode(Sha256::digest(&bytes))
}

/// Global sync state for the record type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelState {
    /// Set once the initial merge has completed
    pub initial_sync_done: bool,

    /// Opaque download cursor
    pub progress_token: Vec<u8>,
}

impl ModelState {
    pub fn with_initial_sync_done(mut self) -> Self {
        self.initial_sync_done = true;
        self
    }
}

/// Everything the metadata store holds, read in one go at startup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataBatch {
    pub model_state: ModelState,
    pub entities: BTreeMap<StorageKey, EntityMetadata>,
}

impl MetadataBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_model_state(&mut self, state: ModelState) {
        self.model_state = state;
    }

    pub fn add_metadata(&mut self, key: StorageKey, metadata: EntityMetadata) {
        self.entities.insert(key, metadata);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_bridge::model::RecordSpecifics;

    #[test]
    fn test_from_remote_copies_envelope() {
        let mut data = EntityData::from_specifics(RecordSpecifics {
            signon_realm: "abc".to_string(),
            ..Default::default()
        });
        data.id = "server-1".to_string();
        data.modification_time = 42;

        let metadata = EntityMetadata::from_remote(&data);
        assert_eq!(metadata.server_id, "server-1");
        assert_eq!(metadata.client_tag_hash, data.client_tag_hash);
        assert_eq!(metadata.modification_time, 42);
        assert!(!metadata.specifics_hash.is_empty());
    }

    #[test]
    fn test_specifics_hash_tracks_payload() {
        let a = EntityData::from_specifics(RecordSpecifics {
            password_value: "one".to_string(),
            ..Default::default()
        });
        let b = EntityData::from_specifics(RecordSpecifics {
            password_value: "two".to_string(),
            ..Default::default()
        });

        assert_ne!(
            EntityMetadata::from_remote(&a).specifics_hash,
            EntityMetadata::from_remote(&b).specifics_hash
        );
    }

    #[test]
    fn test_metadata_batch() {
        let mut batch = MetadataBatch::new();
        assert!(batch.is_empty());

        batch.set_model_state(ModelState::default().with_initial_sync_done());
        batch.add_metadata(StorageKey::from("1"), EntityMetadata::default());

        assert!(batch.model_state.initial_sync_done);
        assert_eq!(batch.len(), 1);
    }
}
