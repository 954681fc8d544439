/*
    change_list.rs - Metadata change lists

    The change processor records bookkeeping through a MetadataChangeList.
    Two flavours exist:
    - InMemoryMetadataChangeList buffers changes until the bridge transfers
      them inside its own transaction
    - StoreMetadataChangeList writes straight through to a metadata store
*/

use crate::core_bridge::errors::BridgeError;
use crate::core_bridge::keys::StorageKey;
use crate::core_bridge::processor::metadata::{EntityMetadata, ModelState};
use crate::core_bridge::store::MetadataStore;
use std::collections::BTreeMap;
use tracing::error;

/// Sink for metadata writes issued by the change processor
pub trait MetadataChangeList {
    fn update_model_state(&mut self, state: &ModelState);
    fn clear_model_state(&mut self);
    fn update_metadata(&mut self, key: &StorageKey, metadata: &EntityMetadata);
    fn clear_metadata(&mut self, key: &StorageKey);
}

/// Buffered change to one entity's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataChange {
    Update(EntityMetadata),
    Clear,
}

/// Buffered change to the model state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStateChange {
    Update(ModelState),
    Clear,
}

/// Metadata change list that keeps everything in memory
///
/// Later writes for the same key replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataChangeList {
    metadata: BTreeMap<StorageKey, MetadataChange>,
    model_state: Option<ModelStateChange>,
}

impl InMemoryMetadataChangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.model_state.is_none()
    }

    pub fn metadata_changes(&self) -> &BTreeMap<StorageKey, MetadataChange> {
        &self.metadata
    }

    pub fn model_state_change(&self) -> Option<&ModelStateChange> {
        self.model_state.as_ref()
    }

    /// Replay all buffered changes into `other`, leaving this list empty
    pub fn transfer_changes(&mut self, other: &mut dyn MetadataChangeList) {
        if let Some(change) = self.model_state.take() {
            match change {
                ModelStateChange::Update(state) => other.update_model_state(&state),
                ModelStateChange::Clear => other.clear_model_state(),
            }
        }

        for (key, change) in std::mem::take(&mut self.metadata) {
            match change {
                MetadataChange::Update(metadata) => other.update_metadata(&key, &metadata),
                MetadataChange::Clear => other.clear_metadata(&key),
            }
        }
    }
}

impl MetadataChangeList for InMemoryMetadataChangeList {
    fn update_model_state(&mut self, state: &ModelState) {
        self.model_state = Some(ModelStateChange::Update(state.clone()));
    }

    fn clear_model_state(&mut self) {
        self.model_state = Some(ModelStateChange::Clear);
    }

    fn update_metadata(&mut self, key: &StorageKey, metadata: &EntityMetadata) {
        self.metadata.insert(key.clone(), MetadataChange::Update(metadata.clone()));
    }

    fn clear_metadata(&mut self, key: &StorageKey) {
        self.metadata.insert(key.clone(), MetadataChange::Clear);
    }
}

/// Metadata change list bound to a metadata store
///
/// Writes land in the store immediately, so they share whatever transaction
/// the store currently has open. The first failure is kept and every later
/// write is dropped; callers must check [`take_error`](Self::take_error).
pub struct StoreMetadataChangeList<'a> {
    store: &'a dyn MetadataStore,
    error: Option<BridgeError>,
}

impl<'a> StoreMetadataChangeList<'a> {
    pub fn new(store: &'a dyn MetadataStore) -> Self {
        StoreMetadataChangeList { store, error: None }
    }

    pub fn metadata_store(&self) -> &'a dyn MetadataStore {
        self.store
    }

    pub fn take_error(&mut self) -> Option<BridgeError> {
        self.error.take()
    }

    fn record<F>(&mut self, op: &str, write: F)
    where
        F: FnOnce(&dyn MetadataStore) -> Result<(), BridgeError>,
    {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = write(self.store) {
            error!(op = op, error = %e, "failed to persist sync metadata");
            self.error = Some(match e {
                BridgeError::MetadataPersistFailure(_) => e,
                other => BridgeError::MetadataPersistFailure(other.to_string()),
            });
        }
    }
}

impl MetadataChangeList for StoreMetadataChangeList<'_> {
    fn update_model_state(&mut self, state: &ModelState) {
        self.record("update_model_state", |store| store.update_model_state(state));
    }

    fn clear_model_state(&mut self) {
        self.record("clear_model_state", |store| store.clear_model_state());
    }

    fn update_metadata(&mut self, key: &StorageKey, metadata: &EntityMetadata) {
        self.record("update_metadata", |store| store.update_sync_metadata(key, metadata));
    }

    fn clear_metadata(&mut self, key: &StorageKey) {
        self.record("clear_metadata", |store| store.clear_sync_metadata(key));
    }
}
