//! Bridge scenarios driven through the public API with in-memory doubles
//!
//! Each test plays the change processor's side of a sync session: loading,
//! merging, applying incremental changes and making local edits.

use std::sync::Arc;
use syncbridge_core::config::BridgeConfig;
use syncbridge_core::core_bridge::{
    BridgeError, ChangeOrigin, EntityChange, MetadataChangeList, PrimaryKey, RecordStore,
    StorageKey, SyncBridge,
};
use syncbridge_core::test_utils::*;

struct Session {
    store: Arc<FakeRecordStore>,
    processor: Arc<RecordingProcessor>,
    bridge: SyncBridge,
}

impl Session {
    fn new() -> Self {
        Self::with_store(Arc::new(FakeRecordStore::new()))
    }

    fn with_store(store: Arc<FakeRecordStore>) -> Self {
        let processor = Arc::new(RecordingProcessor::new());
        let bridge = SyncBridge::new(processor.clone(), store.clone(), BridgeConfig::default());
        Session { store, processor, bridge }
    }
}

#[test]
fn test_first_sync_with_overlapping_data() {
    let store = Arc::new(FakeRecordStore::new());
    store.add_for_primary_key(PrimaryKey(1), make_record("shared"));
    store.add_for_primary_key(PrimaryKey(2), make_record("local-only"));
    let s = Session::with_store(store);
    s.processor.clear();

    let mut mcl = s.bridge.create_metadata_change_list();
    let summary = assert_ok(
        s.bridge.merge_sync_data(&mut mcl, vec![make_remote_add("shared"), make_remote_add("remote")]),
    );

    assert_eq!((summary.matched, summary.remote_only, summary.local_only), (1, 1, 1));

    let puts = s.processor.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, StorageKey::from("2"));

    let updates = s.processor.storage_key_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, StorageKey::from("3"));

    let metadata = assert_ok(s.store.metadata_store().get_all_sync_metadata());
    assert!(metadata.model_state.initial_sync_done);
    assert_eq!(metadata.entities.len(), 3);

    // Merge writes are remote-applied and never echoed back as puts.
    let notifications = s.store.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].origin, ChangeOrigin::RemoteApplied);
}

#[test]
fn test_local_edit_after_sync_reaches_processor() {
    let s = Session::new();
    let mut mcl = s.bridge.create_metadata_change_list();
    assert_ok(s.bridge.merge_sync_data(&mut mcl, vec![]));
    s.processor.clear();

    let outcome = assert_ok(s.bridge.write_local(|scope| scope.add(&make_record("abc"))));
    let key = outcome.changes[0].primary_key;

    let puts = s.processor.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, StorageKey::from(key));
    assert_eq!(puts[0].1.specifics, make_specifics("abc"));
    assert_eq!(s.bridge.stats().local_changes_relayed, 1);

    let mut edited = make_record("abc");
    edited.password_value = "changed".to_string();
    assert_ok(s.bridge.write_local(|scope| scope.update(&edited)));
    assert_ok(s.bridge.write_local(|scope| scope.remove(key)));

    assert_eq!(s.processor.puts().len(), 2);
    assert_eq!(s.processor.deletes(), vec![StorageKey::from(key)]);
    let metadata = assert_ok(s.store.metadata_store().get_all_sync_metadata());
    assert!(!metadata.entities.contains_key(&StorageKey::from(key)));
}

#[test]
fn test_incremental_changes_are_not_echoed() {
    let s = Session::new();
    let mut mcl = s.bridge.create_metadata_change_list();
    assert_ok(s.bridge.apply_sync_changes(&mut mcl, vec![make_remote_add("abc")]));
    let key = s.processor.storage_key_updates()[0].0.clone();

    let mut data = make_remote_entity("abc", "server-abc");
    data.specifics.password_value = "rotated".to_string();
    let changes = vec![EntityChange::create_update(key.clone(), data)];
    let summary = assert_ok(s.bridge.apply_sync_changes(&mut mcl, changes));
    assert_eq!(summary.updated, 1);

    let summary =
        assert_ok(s.bridge.apply_sync_changes(&mut mcl, vec![EntityChange::create_delete(key)]));
    assert_eq!(summary.deleted, 1);

    assert!(s.processor.puts().is_empty());
    assert!(s.processor.deletes().is_empty());
    assert!(s.store.records().is_empty());
    assert_eq!(s.bridge.stats().remote_changes_applied, 3);
}

#[test]
fn test_failed_apply_leaves_store_untouched() {
    let s = Session::new();
    s.store.add_for_primary_key(PrimaryKey(1), make_record("abc"));
    let before = s.store.records();

    let changes = vec![
        EntityChange::create_delete(StorageKey::from("1")),
        make_remote_add("def"),
        EntityChange::create_delete(StorageKey::from("not-a-key")),
    ];
    let mut mcl = s.bridge.create_metadata_change_list();
    let err = assert_bridge_err(s.bridge.apply_sync_changes(&mut mcl, changes));

    assert!(matches!(err, BridgeError::MalformedKey(_)));
    assert_eq!(s.store.records(), before);
    assert!(s.store.notifications().is_empty());
    assert_eq!(s.bridge.stats().batches_rolled_back, 1);
}

#[test]
fn test_processor_metadata_rides_along_with_apply() {
    let s = Session::new();
    let mut mcl = s.bridge.create_metadata_change_list();
    mcl.clear_metadata(&StorageKey::from("42"));
    s.store
        .metadata_store()
        .update_sync_metadata(&StorageKey::from("42"), &Default::default())
        .unwrap();

    assert_ok(s.bridge.apply_sync_changes(&mut mcl, vec![]));

    let metadata = assert_ok(s.store.metadata_store().get_all_sync_metadata());
    assert!(metadata.entities.is_empty());
}

#[test]
fn test_stop_sync_forgets_metadata_but_keeps_records() {
    let s = Session::new();
    let mut mcl = s.bridge.create_metadata_change_list();
    assert_ok(s.bridge.merge_sync_data(&mut mcl, vec![make_remote_add("abc")]));

    assert_ok(s.bridge.apply_stop_sync_changes(true));

    let metadata = assert_ok(s.store.metadata_store().get_all_sync_metadata());
    assert!(metadata.entities.is_empty());
    assert!(!metadata.model_state.initial_sync_done);
    assert_eq!(s.store.records().len(), 1);
}

#[test]
fn test_debug_dump_and_lookup() {
    let s = Session::new();
    s.store.add_for_primary_key(PrimaryKey(1), make_record("abc"));
    s.store.add_for_primary_key(PrimaryKey(2), make_record("def"));

    let dump = assert_ok(s.bridge.get_all_data_for_debugging());
    assert_eq!(dump.len(), 2);
    assert!(dump.iter().all(|(_, data)| data.specifics.password_value == "hidden"));

    let data = assert_ok(s.bridge.get_data(&[StorageKey::from("2"), StorageKey::from("9")]));
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].1.specifics, make_specifics("def"));
    assert_eq!(s.bridge.get_client_tag_hash(&data[0].1), data[0].1.client_tag_hash);

    assert!(s.bridge.store().get_record(PrimaryKey(1)).unwrap().is_some());
}
