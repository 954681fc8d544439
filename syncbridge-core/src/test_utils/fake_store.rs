//! In-memory record and metadata stores
//!
//! `FakeRecordStore` behaves like a permissive local store: keys count up
//! from 1, duplicates by natural key are allowed, and rollback restores the
//! records and metadata captured at `begin_transaction`. Every mutation and
//! transaction boundary is journaled.

use crate::core_bridge::errors::{BridgeError, BridgeResult};
use crate::core_bridge::keys::{PrimaryKey, StorageKey};
use crate::core_bridge::model::{ChangeBatch, ChangeList, ChangeRecord, NaturalKey, Record};
use crate::core_bridge::processor::{EntityMetadata, MetadataBatch, ModelState};
use crate::core_bridge::store::{ChangeNotifier, ChangeObserver, MetadataStore, RecordStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

/// Journal entry for one store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Begin,
    Commit,
    Rollback,
    Add(PrimaryKey),
    Update(PrimaryKey),
    Remove(PrimaryKey),
}

/// Metadata store backed by a map
#[derive(Default)]
pub struct FakeMetadataStore {
    batch: Mutex<MetadataBatch>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    write_attempts: AtomicUsize,
}

impl FakeMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `MetadataPersistFailure`
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `get_all_sync_metadata` fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MetadataBatch {
        self.lock().clone()
    }

    pub fn restore(&self, batch: MetadataBatch) {
        *self.lock() = batch;
    }

    fn lock(&self) -> MutexGuard<'_, MetadataBatch> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<F: FnOnce(&mut MetadataBatch)>(&self, f: F) -> BridgeResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::MetadataPersistFailure("injected failure".to_string()));
        }
        f(&mut self.lock());
        Ok(())
    }
}

impl MetadataStore for FakeMetadataStore {
    fn get_all_sync_metadata(&self) -> BridgeResult<MetadataBatch> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::MetadataPersistFailure("injected read failure".to_string()));
        }
        Ok(self.snapshot())
    }

    fn update_sync_metadata(&self, key: &StorageKey, metadata: &EntityMetadata) -> BridgeResult<()> {
        self.write(|batch| batch.add_metadata(key.clone(), metadata.clone()))
    }

    fn clear_sync_metadata(&self, key: &StorageKey) -> BridgeResult<()> {
        self.write(|batch| {
            batch.entities.remove(key);
        })
    }

    fn update_model_state(&self, state: &ModelState) -> BridgeResult<()> {
        self.write(|batch| batch.set_model_state(state.clone()))
    }

    fn clear_model_state(&self) -> BridgeResult<()> {
        self.write(|batch| batch.set_model_state(ModelState::default()))
    }
}

#[derive(Default)]
struct FakeState {
    records: BTreeMap<PrimaryKey, Record>,
    next_key: i64,
    snapshot: Option<(BTreeMap<PrimaryKey, Record>, i64, MetadataBatch)>,
    calls: Vec<StoreCall>,
    notifications: Vec<ChangeBatch>,
}

/// Record store kept entirely in memory
pub struct FakeRecordStore {
    state: Mutex<FakeState>,
    metadata: FakeMetadataStore,
    notifier: ChangeNotifier,
    fail_commit: AtomicBool,
    fail_mutations: AtomicBool,
}

impl Default for FakeRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRecordStore {
    pub fn new() -> Self {
        FakeRecordStore {
            state: Mutex::new(FakeState { next_key: 1, ..Default::default() }),
            metadata: FakeMetadataStore::new(),
            notifier: ChangeNotifier::default(),
            fail_commit: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
        }
    }

    /// Seed a record under a chosen key, outside any transaction
    pub fn add_for_primary_key(&self, key: PrimaryKey, record: Record) {
        let mut state = self.lock();
        state.records.insert(key, record);
        state.next_key = state.next_key.max(key.value() + 1);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Make add/update/remove fail with `StoreFailure`
    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Journal entries other than transaction boundaries
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, StoreCall::Begin | StoreCall::Commit | StoreCall::Rollback))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn notifications(&self) -> Vec<ChangeBatch> {
        self.lock().notifications.clone()
    }

    pub fn fake_metadata(&self) -> &FakeMetadataStore {
        &self.metadata
    }

    pub fn records(&self) -> BTreeMap<PrimaryKey, Record> {
        self.lock().records.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_mutation(&self) -> BridgeResult<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(BridgeError::StoreFailure("injected failure".to_string()));
        }
        Ok(())
    }

    fn key_for(records: &BTreeMap<PrimaryKey, Record>, key: &NaturalKey) -> Option<PrimaryKey> {
        records.iter().find(|(_, r)| r.natural_key() == *key).map(|(k, _)| *k)
    }
}

impl RecordStore for FakeRecordStore {
    fn read_all(&self) -> BridgeResult<BTreeMap<PrimaryKey, Record>> {
        Ok(self.records())
    }

    fn get_record(&self, key: PrimaryKey) -> BridgeResult<Option<Record>> {
        Ok(self.lock().records.get(&key).cloned())
    }

    fn find_by_natural_key(&self, key: &NaturalKey) -> BridgeResult<Option<PrimaryKey>> {
        Ok(Self::key_for(&self.lock().records, key))
    }

    fn add_record(&self, record: &Record) -> BridgeResult<ChangeList> {
        self.check_mutation()?;
        let mut state = self.lock();
        let key = PrimaryKey(state.next_key);
        state.next_key += 1;
        state.records.insert(key, record.clone());
        state.calls.push(StoreCall::Add(key));
        Ok(vec![ChangeRecord::add(record.clone(), key)])
    }

    fn update_record(&self, record: &Record) -> BridgeResult<ChangeList> {
        self.check_mutation()?;
        let mut state = self.lock();
        let Some(key) = Self::key_for(&state.records, &record.natural_key()) else {
            return Ok(ChangeList::new());
        };
        state.records.insert(key, record.clone());
        state.calls.push(StoreCall::Update(key));
        Ok(vec![ChangeRecord::update(record.clone(), key)])
    }

    fn update_record_at(&self, key: PrimaryKey, record: &Record) -> BridgeResult<ChangeList> {
        self.check_mutation()?;
        let mut state = self.lock();
        match state.records.get_mut(&key) {
            Some(existing) if existing.same_natural_key(record) => *existing = record.clone(),
            _ => return Ok(ChangeList::new()),
        }
        state.calls.push(StoreCall::Update(key));
        Ok(vec![ChangeRecord::update(record.clone(), key)])
    }

    fn remove_record(&self, key: PrimaryKey) -> BridgeResult<ChangeList> {
        self.check_mutation()?;
        let mut state = self.lock();
        let Some(record) = state.records.remove(&key) else {
            return Ok(ChangeList::new());
        };
        state.calls.push(StoreCall::Remove(key));
        Ok(vec![ChangeRecord::remove(record, key)])
    }

    fn begin_transaction(&self) -> BridgeResult<()> {
        let metadata = self.metadata.snapshot();
        let mut state = self.lock();
        if state.snapshot.is_some() {
            return Err(BridgeError::StoreFailure("transaction already open".to_string()));
        }
        state.snapshot = Some((state.records.clone(), state.next_key, metadata));
        state.calls.push(StoreCall::Begin);
        Ok(())
    }

    fn commit_transaction(&self) -> BridgeResult<()> {
        let mut state = self.lock();
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(BridgeError::StoreFailure("injected commit failure".to_string()));
        }
        state.snapshot = None;
        state.calls.push(StoreCall::Commit);
        Ok(())
    }

    fn rollback_transaction(&self) -> BridgeResult<()> {
        let snapshot = {
            let mut state = self.lock();
            state.calls.push(StoreCall::Rollback);
            state.snapshot.take()
        };
        if let Some((records, next_key, metadata)) = snapshot {
            let mut state = self.lock();
            state.records = records;
            state.next_key = next_key;
            drop(state);
            self.metadata.restore(metadata);
        }
        Ok(())
    }

    fn notify_changes(&self, batch: &ChangeBatch) {
        self.lock().notifications.push(batch.clone());
        self.notifier.notify(batch);
    }

    fn add_observer(&self, observer: Weak<dyn ChangeObserver>) {
        self.notifier.add_observer(observer);
    }

    fn metadata_store(&self) -> &dyn MetadataStore {
        &self.metadata
    }
}
