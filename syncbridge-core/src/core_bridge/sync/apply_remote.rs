/*
    apply_remote.rs - Apply incremental remote changes

    Flow:
    1. Open one RemoteApplied batch for the whole change list
    2. Per change:
       - Add: insert with a fresh key, report the key to the processor
       - Update: decode and verify the key, overwrite the record under it
         (re-added under a new key if its natural key changed)
       - Delete: decode and verify the key, remove the record
    3. Persist the processor's metadata changes inside the same transaction
    A failing change aborts the batch; nothing before it is kept.
*/

use crate::core_bridge::batch::BatchScope;
use crate::core_bridge::errors::{BridgeError, BridgeResult};
use crate::core_bridge::keys::{primary_key, storage_key, PrimaryKey, StorageKey};
use crate::core_bridge::model::{ChangeKind, ChangeOrigin, EntityChange, EntityChangeKind, EntityData};
use crate::core_bridge::processor::{
    ChangeProcessor, InMemoryMetadataChangeList, MetadataChangeList, StoreMetadataChangeList,
};
use crate::core_bridge::sync::SyncContext;
use crate::metrics::{self, Timer};
use tracing::{debug, info, info_span};

/// Counts of applied changes by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ApplySummary {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

/// Apply a list of remote changes as one local transaction
pub fn apply_remote_changes(
    ctx: SyncContext<'_>,
    metadata_change_list: &mut InMemoryMetadataChangeList,
    changes: Vec<EntityChange>,
) -> BridgeResult<ApplySummary> {
    let _span = info_span!("apply", changes = changes.len()).entered();
    let timer = Timer::new(metrics::APPLY_DURATION);

    let result = ctx.batcher.run(ChangeOrigin::RemoteApplied, |scope| {
        let mut sync_mcl = StoreMetadataChangeList::new(ctx.store.metadata_store());
        let mut summary = ApplySummary::default();

        for change in changes {
            match change.kind {
                EntityChangeKind::Add => {
                    let data = require_data(&change)?;
                    add_entity(scope, &mut sync_mcl, ctx.processor, data)?;
                    summary.added += 1;
                }
                EntityChangeKind::Update => {
                    let key = resident_key(scope, &change.storage_key)?;
                    let data = require_data(&change)?;
                    update_entity(scope, &mut sync_mcl, ctx.processor, key, data)?;
                    summary.updated += 1;
                }
                EntityChangeKind::Delete => {
                    let key = resident_key(scope, &change.storage_key)?;
                    scope.remove(key)?;
                    sync_mcl.clear_metadata(&change.storage_key);
                    debug!(primary_key = %key, "applied remote delete");
                    summary.deleted += 1;
                }
            }
        }

        metadata_change_list.transfer_changes(&mut sync_mcl);

        match sync_mcl.take_error() {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    });
    timer.stop();

    match result {
        Ok(outcome) => {
            let summary = outcome.value;
            metrics::record_counter(metrics::APPLY_CHANGES, summary.total() as u64);
            info!(
                added = summary.added,
                updated = summary.updated,
                deleted = summary.deleted,
                "remote changes applied"
            );
            Ok(summary)
        }
        Err(e) => {
            metrics::record_counter(metrics::APPLY_FAILED, 1);
            Err(e)
        }
    }
}

fn require_data(change: &EntityChange) -> BridgeResult<&EntityData> {
    change.data.as_ref().ok_or_else(|| {
        BridgeError::InvalidEntity(format!(
            "{:?} change for {:?} has no data",
            change.kind,
            change.storage_key.as_str()
        ))
    })
}

/// Decode a storage key and check a record lives under it
fn resident_key(scope: &BatchScope<'_>, key: &StorageKey) -> BridgeResult<PrimaryKey> {
    let primary = primary_key(key)?;
    match scope.store().get_record(primary)? {
        Some(_) => Ok(primary),
        None => Err(BridgeError::NotFound(key.to_string())),
    }
}

fn add_entity(
    scope: &mut BatchScope<'_>,
    mcl: &mut StoreMetadataChangeList<'_>,
    processor: &dyn ChangeProcessor,
    data: &EntityData,
) -> BridgeResult<PrimaryKey> {
    let mut new_key = None;
    for change in scope.add(&data.to_record())? {
        match change.kind {
            ChangeKind::Add => new_key = Some(change.primary_key),
            // The store replaced a record with the same natural key.
            _ => mcl.clear_metadata(&change.storage_key()),
        }
    }
    let key = new_key
        .ok_or_else(|| BridgeError::StoreFailure("add reported no new record".to_string()))?;

    debug!(primary_key = %key, "applied remote add");
    processor.update_storage_key(data, &storage_key(key), mcl);
    Ok(key)
}

fn update_entity(
    scope: &mut BatchScope<'_>,
    mcl: &mut StoreMetadataChangeList<'_>,
    processor: &dyn ChangeProcessor,
    key: PrimaryKey,
    data: &EntityData,
) -> BridgeResult<()> {
    let record = data.to_record();
    if !scope.update_at(key, &record)?.is_empty() {
        debug!(primary_key = %key, "applied remote update");
        return Ok(());
    }

    // The natural key changed: the record moves to a new primary key.
    scope.remove(key)?;
    mcl.clear_metadata(&storage_key(key));
    let new_key = add_entity(scope, mcl, processor, data)?;
    debug!(old = %key, new = %new_key, "remote update re-keyed record");
    Ok(())
}
