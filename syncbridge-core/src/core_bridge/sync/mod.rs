/*
    Sync subsystem - Reconcile the local store with the change processor

    Remote data flows in through merge (once, at initial sync) and apply
    (incrementally afterwards). Local edits flow out through the relay.
*/

pub mod apply_remote;
pub mod merge;
pub mod relay;

pub use apply_remote::{apply_remote_changes, ApplySummary};
pub use merge::{merge_remote_data, MergeSummary};
pub use relay::LocalOriginRelay;

use crate::core_bridge::batch::ChangeBatcher;
use crate::core_bridge::processor::ChangeProcessor;
use crate::core_bridge::store::RecordStore;

/// Collaborators a merge or apply works against
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub store: &'a dyn RecordStore,
    pub processor: &'a dyn ChangeProcessor,
    pub batcher: &'a ChangeBatcher,
}

impl<'a> SyncContext<'a> {
    pub fn new(batcher: &'a ChangeBatcher, processor: &'a dyn ChangeProcessor) -> Self {
        SyncContext { store: batcher.store(), processor, batcher }
    }
}
