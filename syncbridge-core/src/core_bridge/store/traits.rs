/*
    traits.rs - Collaborator interfaces on the local side

    RecordStore is the transactional credential store; MetadataStore is the
    durable home for sync bookkeeping. Both take &self: implementations own
    their synchronisation, and the bridge never runs two batches at once.
*/

use crate::core_bridge::errors::BridgeResult;
use crate::core_bridge::keys::{PrimaryKey, StorageKey};
use crate::core_bridge::model::{ChangeBatch, ChangeList, NaturalKey, Record};
use crate::core_bridge::processor::{EntityMetadata, MetadataBatch, ModelState};
use std::collections::BTreeMap;
use std::sync::Weak;

/// Listener for post-commit change notifications
pub trait ChangeObserver: Send + Sync {
    fn on_changes(&self, batch: &ChangeBatch);
}

/// Durable storage for per-record sync metadata and the model state
pub trait MetadataStore: Send + Sync {
    fn get_all_sync_metadata(&self) -> BridgeResult<MetadataBatch>;
    fn update_sync_metadata(&self, key: &StorageKey, metadata: &EntityMetadata) -> BridgeResult<()>;
    fn clear_sync_metadata(&self, key: &StorageKey) -> BridgeResult<()>;
    fn update_model_state(&self, state: &ModelState) -> BridgeResult<()>;
    fn clear_model_state(&self) -> BridgeResult<()>;
}

/// Transactional record store that owns primary-key assignment
pub trait RecordStore: Send + Sync {
    /// Snapshot of every resident record
    fn read_all(&self) -> BridgeResult<BTreeMap<PrimaryKey, Record>>;

    fn get_record(&self, key: PrimaryKey) -> BridgeResult<Option<Record>>;

    fn find_by_natural_key(&self, key: &NaturalKey) -> BridgeResult<Option<PrimaryKey>>;

    /// Insert a record under a freshly assigned key.
    ///
    /// A store that enforces natural-key uniqueness may replace an existing
    /// record, reporting a Remove for the old key before the Add.
    fn add_record(&self, record: &Record) -> BridgeResult<ChangeList>;

    /// Overwrite the record with the same natural key; empty if none exists
    fn update_record(&self, record: &Record) -> BridgeResult<ChangeList>;

    /// Overwrite the record stored under `key`
    ///
    /// Empty if the key is not resident or holds a different natural key.
    fn update_record_at(&self, key: PrimaryKey, record: &Record) -> BridgeResult<ChangeList>;

    /// Delete by primary key; empty if the key is not resident
    fn remove_record(&self, key: PrimaryKey) -> BridgeResult<ChangeList>;

    fn begin_transaction(&self) -> BridgeResult<()>;
    fn commit_transaction(&self) -> BridgeResult<()>;
    fn rollback_transaction(&self) -> BridgeResult<()>;

    /// Deliver a committed batch to every observer
    fn notify_changes(&self, batch: &ChangeBatch);

    fn add_observer(&self, observer: Weak<dyn ChangeObserver>);

    /// Metadata store sharing this store's persistence
    fn metadata_store(&self) -> &dyn MetadataStore;
}
