/*
    relay.rs - Forward local edits to the change processor

    Registered with the record store as a change observer. Batches the
    bridge itself applied from the remote side carry the RemoteApplied
    origin and are never forwarded back.
*/

use crate::core_bridge::errors::BridgeResult;
use crate::core_bridge::keys::StorageKey;
use crate::core_bridge::model::{entity_from_record, ChangeBatch, ChangeKind};
use crate::core_bridge::processor::{ChangeProcessor, StoreMetadataChangeList};
use crate::core_bridge::store::{ChangeObserver, RecordStore};
use crate::metrics::{self, MetricsCollector};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Observer that turns local ChangeRecords into put/delete calls
pub struct LocalOriginRelay {
    store: Arc<dyn RecordStore>,
    processor: Arc<dyn ChangeProcessor>,
    stats: Arc<MetricsCollector>,
}

impl LocalOriginRelay {
    pub fn new(
        store: Arc<dyn RecordStore>,
        processor: Arc<dyn ChangeProcessor>,
        stats: Arc<MetricsCollector>,
    ) -> Self {
        LocalOriginRelay { store, processor, stats }
    }

    fn skip(&self, reason: &'static str, batch: &ChangeBatch) {
        trace!(reason = reason, changes = batch.len(), "relay skipped batch");
        self.stats.inc_relay_skipped();
        metrics::record_counter(metrics::RELAY_SKIPPED, 1);
    }

    fn forward(&self, batch: &ChangeBatch) -> BridgeResult<()> {
        self.store.begin_transaction()?;

        let mut mcl = StoreMetadataChangeList::new(self.store.metadata_store());
        let (mut puts, mut deletes) = (0u64, 0u64);
        for change in &batch.changes {
            let key: StorageKey = change.storage_key();
            match change.kind {
                ChangeKind::Add | ChangeKind::Update => {
                    self.processor.put(&key, entity_from_record(&change.record), &mut mcl);
                    puts += 1;
                }
                ChangeKind::Remove => {
                    self.processor.delete(&key, &mut mcl);
                    deletes += 1;
                }
            }
        }

        if let Some(e) = mcl.take_error() {
            if let Err(rollback) = self.store.rollback_transaction() {
                error!(error = %rollback, "relay rollback failed");
            }
            return Err(e);
        }
        self.store.commit_transaction()?;

        metrics::record_counter(metrics::RELAY_PUT, puts);
        metrics::record_counter(metrics::RELAY_DELETE, deletes);
        self.stats.add_relayed(puts + deletes);
        debug!(puts, deletes, "local changes forwarded");
        Ok(())
    }
}

impl ChangeObserver for LocalOriginRelay {
    fn on_changes(&self, batch: &ChangeBatch) {
        if !batch.is_local() {
            self.skip("remote-applied", batch);
            return;
        }
        if !self.processor.is_tracking_metadata() {
            self.skip("not tracking", batch);
            return;
        }

        if let Err(e) = self.forward(batch) {
            error!(error = %e, "failed to forward local changes");
            self.processor.report_error(&e);
        }
    }
}
