//! Change processor that records every call

use crate::core_bridge::errors::BridgeError;
use crate::core_bridge::keys::StorageKey;
use crate::core_bridge::model::EntityData;
use crate::core_bridge::processor::{ChangeProcessor, EntityMetadata, MetadataBatch, MetadataChangeList};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorCall {
    Put { key: StorageKey, data: EntityData },
    Delete { key: StorageKey },
    UpdateStorageKey { key: StorageKey, data: EntityData },
    ModelReadyToSync(MetadataBatch),
    ReportError(BridgeError),
}

/// Processor double that tracks metadata like a real one would
///
/// `put` and `update_storage_key` write entity metadata through the list
/// they are given; `delete` clears it.
pub struct RecordingProcessor {
    tracking: AtomicBool,
    calls: Mutex<Vec<ProcessorCall>>,
}

impl Default for RecordingProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingProcessor {
    /// Processor with metadata tracking enabled
    pub fn new() -> Self {
        RecordingProcessor { tracking: AtomicBool::new(true), calls: Mutex::new(Vec::new()) }
    }

    pub fn set_tracking(&self, tracking: bool) {
        self.tracking.store(tracking, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn puts(&self) -> Vec<(StorageKey, EntityData)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessorCall::Put { key, data } => Some((key, data)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<StorageKey> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessorCall::Delete { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn storage_key_updates(&self) -> Vec<(StorageKey, EntityData)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessorCall::UpdateStorageKey { key, data } => Some((key, data)),
                _ => None,
            })
            .collect()
    }

    pub fn model_ready_batches(&self) -> Vec<MetadataBatch> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessorCall::ModelReadyToSync(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<BridgeError> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessorCall::ReportError(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProcessorCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChangeProcessor for RecordingProcessor {
    fn is_tracking_metadata(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    fn put(&self, storage_key: &StorageKey, data: EntityData, metadata: &mut dyn MetadataChangeList) {
        let entry = EntityMetadata {
            client_tag_hash: data.client_tag_hash.clone(),
            sequence_number: 1,
            ..Default::default()
        };
        metadata.update_metadata(storage_key, &entry);
        self.lock().push(ProcessorCall::Put { key: storage_key.clone(), data });
    }

    fn delete(&self, storage_key: &StorageKey, metadata: &mut dyn MetadataChangeList) {
        metadata.clear_metadata(storage_key);
        self.lock().push(ProcessorCall::Delete { key: storage_key.clone() });
    }

    fn update_storage_key(
        &self,
        data: &EntityData,
        storage_key: &StorageKey,
        metadata: &mut dyn MetadataChangeList,
    ) {
        metadata.update_metadata(storage_key, &EntityMetadata::from_remote(data));
        self.lock()
            .push(ProcessorCall::UpdateStorageKey { key: storage_key.clone(), data: data.clone() });
    }

    fn model_ready_to_sync(&self, batch: MetadataBatch) {
        self.lock().push(ProcessorCall::ModelReadyToSync(batch));
    }

    fn report_error(&self, error: &BridgeError) {
        self.lock().push(ProcessorCall::ReportError(error.clone()));
    }
}
