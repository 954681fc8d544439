/*
    merge.rs - Initial reconciliation of local and remote data

    Runs once, when sync is first enabled for the record type.

    Flow:
    1. Read every local record and index all keys under each client tag
    2. For each remote entity:
       - matched, same natural key: overwrite that record in place (remote wins)
       - matched, natural key spelled differently: replace one unmatched
         record under a new key
       - remote only: add it locally and report the fresh storage key
    3. Upload every local record no remote entity matched
    4. Persist metadata, transfer the processor's changes, mark the initial
       sync done
    All of it is one RemoteApplied batch: any failure rolls everything back.
*/

use crate::core_bridge::batch::BatchScope;
use crate::core_bridge::errors::{BridgeError, BridgeResult};
use crate::core_bridge::identity::client_tag;
use crate::core_bridge::keys::{storage_key, PrimaryKey};
use crate::core_bridge::model::{
    entity_from_record, ChangeKind, ChangeOrigin, EntityChangeList, EntityData, Record,
    RecordSpecifics,
};
use crate::core_bridge::processor::{
    ChangeProcessor, EntityMetadata, InMemoryMetadataChangeList, MetadataChangeList, ModelState,
    ModelStateChange, StoreMetadataChangeList,
};
use crate::core_bridge::sync::SyncContext;
use crate::metrics::{self, Timer};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, info_span};

/// What a merge did with each record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub matched: usize,
    pub remote_only: usize,
    pub local_only: usize,
}

/// Merge the full remote data set into the local store
pub fn merge_remote_data(
    ctx: SyncContext<'_>,
    metadata_change_list: &mut InMemoryMetadataChangeList,
    remote: EntityChangeList,
) -> BridgeResult<MergeSummary> {
    let _span = info_span!("merge", remote = remote.len()).entered();
    let timer = Timer::new(metrics::MERGE_DURATION);

    let result = ctx.batcher.run(ChangeOrigin::RemoteApplied, |scope| {
        let mut sync_mcl = StoreMetadataChangeList::new(ctx.store.metadata_store());
        let mut summary = MergeSummary::default();

        let local = scope.store().read_all()?;
        let mut by_tag: HashMap<String, Vec<PrimaryKey>> = HashMap::with_capacity(local.len());
        for (key, record) in &local {
            by_tag.entry(client_tag(&RecordSpecifics::from(record))).or_default().push(*key);
        }
        let mut matched = BTreeSet::new();
        let mut replaced = BTreeSet::new();

        for change in remote {
            let data = change.data.ok_or_else(|| {
                BridgeError::InvalidEntity("remote entity without data".to_string())
            })?;
            let tag = client_tag(&data.specifics);
            let record = data.to_record();
            let candidates: Vec<PrimaryKey> = by_tag
                .get(&tag)
                .map(|keys| keys.iter().copied().filter(|key| !replaced.contains(key)).collect())
                .unwrap_or_default();

            // A record with exactly this natural key takes the remote data in place.
            let mut updated = None;
            for key in &candidates {
                if !scope.update_at(*key, &record)?.is_empty() {
                    updated = Some(*key);
                    break;
                }
            }

            if let Some(key) = updated {
                matched.insert(key);
                summary.matched += 1;
                debug!(primary_key = %key, "matched remote entity");
                sync_mcl.update_metadata(&storage_key(key), &EntityMetadata::from_remote(&data));
            } else if let Some(key) = candidates.iter().copied().find(|key| !matched.contains(key)) {
                // Same tag, differently spelled natural key.
                summary.matched += 1;
                replaced.insert(key);
                scope.remove(key)?;
                sync_mcl.clear_metadata(&storage_key(key));
                let new_key = materialize(
                    scope,
                    &mut sync_mcl,
                    ctx.processor,
                    &data,
                    &record,
                    &mut replaced,
                )?;
                debug!(old = %key, new = %new_key, "matched remote entity re-keyed");
                by_tag.entry(tag).or_default().push(new_key);
            } else {
                summary.remote_only += 1;
                let new_key = materialize(
                    scope,
                    &mut sync_mcl,
                    ctx.processor,
                    &data,
                    &record,
                    &mut replaced,
                )?;
                by_tag.entry(tag).or_default().push(new_key);
            }
        }

        for (key, record) in &local {
            if matched.contains(key) || replaced.contains(key) {
                continue;
            }
            debug!(primary_key = %key, "uploading local-only record");
            ctx.processor.put(&storage_key(*key), entity_from_record(record), &mut sync_mcl);
            summary.local_only += 1;
        }

        let state = match metadata_change_list.model_state_change() {
            Some(ModelStateChange::Update(state)) => state.clone(),
            _ => ModelState::default(),
        }
        .with_initial_sync_done();
        metadata_change_list.transfer_changes(&mut sync_mcl);
        sync_mcl.update_model_state(&state);

        match sync_mcl.take_error() {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    });
    timer.stop();

    let summary = result?.value;
    metrics::record_counter(metrics::MERGE_MATCHED, summary.matched as u64);
    metrics::record_counter(metrics::MERGE_REMOTE_ONLY, summary.remote_only as u64);
    metrics::record_counter(metrics::MERGE_LOCAL_ONLY, summary.local_only as u64);
    info!(
        matched = summary.matched,
        remote_only = summary.remote_only,
        local_only = summary.local_only,
        "initial merge complete"
    );

    Ok(summary)
}

/// Add a remote record locally and tell the processor its new key
fn materialize(
    scope: &mut BatchScope<'_>,
    mcl: &mut StoreMetadataChangeList<'_>,
    processor: &dyn ChangeProcessor,
    data: &EntityData,
    record: &Record,
    replaced: &mut BTreeSet<PrimaryKey>,
) -> BridgeResult<PrimaryKey> {
    let mut new_key = None;
    for change in scope.add(record)? {
        match change.kind {
            ChangeKind::Add => new_key = Some(change.primary_key),
            _ => {
                replaced.insert(change.primary_key);
                mcl.clear_metadata(&change.storage_key());
            }
        }
    }
    let key = new_key
        .ok_or_else(|| BridgeError::StoreFailure("add reported no new record".to_string()))?;

    let key_string = storage_key(key);
    debug!(primary_key = %key, "materialized remote entity");
    mcl.update_metadata(&key_string, &EntityMetadata::from_remote(data));
    processor.update_storage_key(data, &key_string, mcl);
    Ok(key)
}
