/*
    batch.rs - Transactional grouping of local store mutations

    Every write the bridge makes to the local store goes through a
    ChangeBatcher run:
    - one store transaction per run, committed only if the body succeeds
    - the ChangeRecords of every mutation are concatenated in call order
    - after commit, exactly one notification carrying the full list and the
      run's origin, unless the list is empty
    A failed run is rolled back and reports no ChangeRecords to anyone.
*/

use crate::core_bridge::errors::{BridgeError, BridgeResult};
use crate::core_bridge::keys::PrimaryKey;
use crate::core_bridge::model::{ChangeBatch, ChangeList, ChangeOrigin, Record};
use crate::core_bridge::store::RecordStore;
use crate::metrics::{self, MetricsCollector};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle through which a batch body mutates the store
pub struct BatchScope<'a> {
    store: &'a dyn RecordStore,
    changes: ChangeList,
}

impl<'a> BatchScope<'a> {
    /// Add a record; returns the ChangeRecords of this call
    pub fn add(&mut self, record: &Record) -> BridgeResult<ChangeList> {
        let changes = self.store.add_record(record)?;
        self.changes.extend(changes.iter().cloned());
        Ok(changes)
    }

    pub fn update(&mut self, record: &Record) -> BridgeResult<ChangeList> {
        let changes = self.store.update_record(record)?;
        self.changes.extend(changes.iter().cloned());
        Ok(changes)
    }

    /// Update the record under `key` only, even if another shares its natural key
    pub fn update_at(&mut self, key: PrimaryKey, record: &Record) -> BridgeResult<ChangeList> {
        let changes = self.store.update_record_at(key, record)?;
        self.changes.extend(changes.iter().cloned());
        Ok(changes)
    }

    pub fn remove(&mut self, key: PrimaryKey) -> BridgeResult<ChangeList> {
        let changes = self.store.remove_record(key)?;
        self.changes.extend(changes.iter().cloned());
        Ok(changes)
    }

    /// Read access to the store inside the open transaction
    pub fn store(&self) -> &'a dyn RecordStore {
        self.store
    }

    /// Changes collected so far
    pub fn changes(&self) -> &ChangeList {
        &self.changes
    }
}

/// Result of a committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<T> {
    pub value: T,
    pub changes: ChangeList,
}

/// Runs closures as single all-or-nothing store transactions
pub struct ChangeBatcher {
    store: Arc<dyn RecordStore>,
    stats: Arc<MetricsCollector>,
}

impl ChangeBatcher {
    pub fn new(store: Arc<dyn RecordStore>, stats: Arc<MetricsCollector>) -> Self {
        ChangeBatcher { store, stats }
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Run `body` inside one transaction tagged with `origin`
    pub fn run<T, F>(&self, origin: ChangeOrigin, body: F) -> BridgeResult<BatchOutcome<T>>
    where
        F: FnOnce(&mut BatchScope<'_>) -> BridgeResult<T>,
    {
        let store = self.store.as_ref();
        store.begin_transaction()?;

        let mut scope = BatchScope { store, changes: ChangeList::new() };
        let value = match body(&mut scope) {
            Ok(value) => value,
            Err(e) => {
                self.abort(&e);
                return Err(e);
            }
        };

        if let Err(e) = store.commit_transaction() {
            self.abort(&e);
            return Err(e);
        }

        let changes = scope.changes;
        self.stats.inc_committed();
        metrics::record_counter(metrics::BATCH_COMMITTED, 1);
        metrics::record_histogram(metrics::BATCH_SIZE, changes.len() as f64);
        debug!(?origin, changes = changes.len(), "batch committed");

        if !changes.is_empty() {
            store.notify_changes(&ChangeBatch::new(origin, changes.clone()));
        }

        Ok(BatchOutcome { value, changes })
    }

    fn abort(&self, cause: &BridgeError) {
        warn!(error = %cause, "rolling back batch");
        if let Err(e) = self.store.rollback_transaction() {
            warn!(error = %e, "rollback failed");
        }
        self.stats.inc_rolled_back();
        metrics::record_counter(metrics::BATCH_ROLLED_BACK, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_bridge::model::ChangeKind;
    use crate::test_utils::fixtures::make_record;
    use crate::test_utils::{FakeRecordStore, StoreCall};

    fn batcher(store: &Arc<FakeRecordStore>) -> ChangeBatcher {
        ChangeBatcher::new(store.clone(), Arc::new(MetricsCollector::new()))
    }

    #[test]
    fn test_commit_notifies_once_with_all_changes() {
        let store = Arc::new(FakeRecordStore::new());
        let outcome = batcher(&store)
            .run(ChangeOrigin::Local, |scope| {
                scope.add(&make_record("abc"))?;
                scope.add(&make_record("def"))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.changes.len(), 2);
        let notifications = store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].origin, ChangeOrigin::Local);
        assert_eq!(notifications[0].primary_keys(), vec![PrimaryKey(1), PrimaryKey(2)]);
    }

    #[test]
    fn test_failure_rolls_back_without_notification() {
        let store = Arc::new(FakeRecordStore::new());
        let result = batcher(&store).run(ChangeOrigin::RemoteApplied, |scope| {
            scope.add(&make_record("abc"))?;
            Err::<(), _>(BridgeError::StoreFailure("disk full".to_string()))
        });

        assert!(matches!(result, Err(BridgeError::StoreFailure(_))));
        assert!(store.notifications().is_empty());
        assert!(store.read_all().unwrap().is_empty());
        assert_eq!(store.calls().last(), Some(&StoreCall::Rollback));
    }

    #[test]
    fn test_empty_batch_raises_no_notification() {
        let store = Arc::new(FakeRecordStore::new());
        let outcome = batcher(&store).run(ChangeOrigin::Local, |_| Ok(7)).unwrap();

        assert_eq!(outcome.value, 7);
        assert!(outcome.changes.is_empty());
        assert!(store.notifications().is_empty());
        assert_eq!(store.calls(), vec![StoreCall::Begin, StoreCall::Commit]);
    }

    #[test]
    fn test_commit_failure_reports_no_changes() {
        let store = Arc::new(FakeRecordStore::new());
        store.fail_commit(true);

        let result = batcher(&store).run(ChangeOrigin::Local, |scope| scope.add(&make_record("abc")));

        assert!(result.is_err());
        assert!(store.notifications().is_empty());
    }

    #[test]
    fn test_scope_returns_per_call_changes() {
        let store = Arc::new(FakeRecordStore::new());
        store.add_for_primary_key(PrimaryKey(1000), make_record("abc"));

        batcher(&store)
            .run(ChangeOrigin::Local, |scope| {
                let removed = scope.remove(PrimaryKey(1000))?;
                assert_eq!(removed[0].kind, ChangeKind::Remove);
                assert_eq!(scope.changes().len(), 1);
                Ok(())
            })
            .unwrap();
    }
}
