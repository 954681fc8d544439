/*
    Processor - The remote change processor seam

    The change processor is the sync engine's per-type state machine. The
    bridge drives it with local changes and key assignments; the processor
    drives the bridge with merge/apply calls.
*/

pub mod change_list;
pub mod metadata;

pub use change_list::{
    InMemoryMetadataChangeList, MetadataChange, MetadataChangeList, ModelStateChange,
    StoreMetadataChangeList,
};
pub use metadata::{EntityMetadata, MetadataBatch, ModelState};

use crate::core_bridge::errors::BridgeError;
use crate::core_bridge::keys::StorageKey;
use crate::core_bridge::model::EntityData;

/// Remote-side collaborator that tracks sync state for every record
pub trait ChangeProcessor: Send + Sync {
    /// Whether sync is running and metadata is being tracked
    fn is_tracking_metadata(&self) -> bool;

    /// Announce a local creation or update
    fn put(&self, storage_key: &StorageKey, data: EntityData, metadata: &mut dyn MetadataChangeList);

    /// Announce a local deletion
    fn delete(&self, storage_key: &StorageKey, metadata: &mut dyn MetadataChangeList);

    /// Tell the processor which storage key a remote entity received locally
    fn update_storage_key(
        &self,
        data: &EntityData,
        storage_key: &StorageKey,
        metadata: &mut dyn MetadataChangeList,
    );

    /// Hand over persisted metadata; called once when the bridge starts
    fn model_ready_to_sync(&self, batch: MetadataBatch);

    /// Report a failure the bridge could not surface through a return value
    fn report_error(&self, error: &BridgeError);
}
