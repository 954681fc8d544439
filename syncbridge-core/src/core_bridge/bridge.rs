/*
    bridge.rs - The sync bridge the change processor talks to

    Owns the batcher and the local-origin relay for one record store and
    one change processor. Construction wires the relay into the store and
    hands the persisted metadata to the processor.
*/

use crate::config::BridgeConfig;
use crate::core_bridge::batch::{BatchOutcome, BatchScope, ChangeBatcher};
use crate::core_bridge::errors::BridgeResult;
use crate::core_bridge::identity::{client_tag, client_tag_hash};
use crate::core_bridge::keys::{primary_key, storage_key, StorageKey};
use crate::core_bridge::model::{entity_from_record, ChangeOrigin, DataBatch, EntityChangeList, EntityData};
use crate::core_bridge::processor::{
    ChangeProcessor, InMemoryMetadataChangeList, MetadataChangeList, StoreMetadataChangeList,
};
use crate::core_bridge::store::{ChangeObserver, RecordStore};
use crate::core_bridge::sync::{
    apply_remote_changes, merge_remote_data, ApplySummary, LocalOriginRelay, MergeSummary,
    SyncContext,
};
use crate::metrics::{BridgeStats, MetricsCollector};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Bridge between a local record store and a remote change processor
pub struct SyncBridge {
    store: Arc<dyn RecordStore>,
    processor: Arc<dyn ChangeProcessor>,
    batcher: ChangeBatcher,
    relay: Arc<LocalOriginRelay>,
    stats: Arc<MetricsCollector>,
    config: BridgeConfig,
}

impl SyncBridge {
    /// Create a bridge, register its relay and report the persisted state
    ///
    /// The processor receives exactly one of `model_ready_to_sync` (with
    /// everything the metadata store holds) or `report_error`.
    pub fn new(
        processor: Arc<dyn ChangeProcessor>,
        store: Arc<dyn RecordStore>,
        config: BridgeConfig,
    ) -> Self {
        let stats = Arc::new(MetricsCollector::new());
        let relay = Arc::new(LocalOriginRelay::new(store.clone(), processor.clone(), stats.clone()));
        let observer: Arc<dyn ChangeObserver> = relay.clone();
        store.add_observer(Arc::downgrade(&observer));

        match store.metadata_store().get_all_sync_metadata() {
            Ok(batch) => {
                info!(
                    entities = batch.len(),
                    initial_sync_done = batch.model_state.initial_sync_done,
                    "sync metadata loaded"
                );
                processor.model_ready_to_sync(batch);
            }
            Err(e) => {
                error!(error = %e, "failed to load sync metadata");
                processor.report_error(&e);
            }
        }

        let batcher = ChangeBatcher::new(store.clone(), stats.clone());
        SyncBridge { store, processor, batcher, relay, stats, config }
    }

    /// Fresh list for the processor to collect metadata changes in
    pub fn create_metadata_change_list(&self) -> InMemoryMetadataChangeList {
        InMemoryMetadataChangeList::new()
    }

    pub fn get_client_tag(&self, data: &EntityData) -> String {
        client_tag(&data.specifics)
    }

    pub fn get_client_tag_hash(&self, data: &EntityData) -> String {
        client_tag_hash(&self.get_client_tag(data))
    }

    /// Look up records by storage key; keys with no resident record are skipped
    pub fn get_data(&self, storage_keys: &[StorageKey]) -> BridgeResult<DataBatch> {
        let mut batch = DataBatch::with_capacity(storage_keys.len());
        for key in storage_keys {
            let primary = primary_key(key)?;
            match self.store.get_record(primary)? {
                Some(record) => batch.push((key.clone(), entity_from_record(&record))),
                None => debug!(storage_key = %key, "requested record not resident"),
            }
        }
        Ok(batch)
    }

    /// Every record, with secrets replaced by the configured placeholder
    pub fn get_all_data_for_debugging(&self) -> BridgeResult<DataBatch> {
        let placeholder = &self.config.debug_secret_placeholder;
        let batch = self
            .store
            .read_all()?
            .into_iter()
            .map(|(key, mut record)| {
                record.password_value = placeholder.clone();
                (storage_key(key), entity_from_record(&record))
            })
            .collect();
        Ok(batch)
    }

    pub fn merge_sync_data(
        &self,
        metadata_change_list: &mut InMemoryMetadataChangeList,
        remote: EntityChangeList,
    ) -> BridgeResult<MergeSummary> {
        merge_remote_data(self.context(), metadata_change_list, remote)
    }

    pub fn apply_sync_changes(
        &self,
        metadata_change_list: &mut InMemoryMetadataChangeList,
        changes: EntityChangeList,
    ) -> BridgeResult<ApplySummary> {
        let summary = apply_remote_changes(self.context(), metadata_change_list, changes)?;
        self.stats.add_applied(summary.total() as u64);
        Ok(summary)
    }

    /// Sync was turned off; optionally forget all sync metadata
    pub fn apply_stop_sync_changes(&self, delete_metadata: bool) -> BridgeResult<()> {
        if !delete_metadata {
            return Ok(());
        }

        let cleared = self.batcher.run(ChangeOrigin::RemoteApplied, |scope| {
            let metadata_store = scope.store().metadata_store();
            let batch = metadata_store.get_all_sync_metadata()?;

            let mut mcl = StoreMetadataChangeList::new(metadata_store);
            for key in batch.entities.keys() {
                mcl.clear_metadata(key);
            }
            mcl.clear_model_state();

            match mcl.take_error() {
                Some(e) => Err(e),
                None => Ok(batch.len()),
            }
        })?;

        info!(entities = cleared.value, "sync metadata deleted");
        Ok(())
    }

    /// Run a local write; committed changes reach the processor via the relay
    pub fn write_local<T, F>(&self, body: F) -> BridgeResult<BatchOutcome<T>>
    where
        F: FnOnce(&mut BatchScope<'_>) -> BridgeResult<T>,
    {
        self.batcher.run(ChangeOrigin::Local, body)
    }

    pub fn relay(&self) -> &Arc<LocalOriginRelay> {
        &self.relay
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats.snapshot()
    }

    fn context(&self) -> SyncContext<'_> {
        SyncContext::new(&self.batcher, self.processor.as_ref())
    }
}
