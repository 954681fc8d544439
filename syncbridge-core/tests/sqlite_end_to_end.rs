//! End-to-end tests against the SQLite record store
//!
//! Records and sync metadata share one database, so these exercise the
//! transactional guarantees for real: rollback, persistence across reopen
//! and the natural-key uniqueness the schema enforces.

use std::sync::Arc;
use syncbridge_core::config::{BridgeConfig, StoreConfig};
use syncbridge_core::core_bridge::{
    BridgeError, ChangeKind, ChangeOrigin, EntityChange, MergeSummary, MetadataStore, PrimaryKey,
    RecordStore, SqliteRecordStore, StorageKey, SyncBridge,
};
use syncbridge_core::test_utils::*;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<SqliteRecordStore> {
    let path = dir.path().join("records.db");
    Arc::new(assert_ok(SqliteRecordStore::open(path, &StoreConfig::default())))
}

fn connect(store: &Arc<SqliteRecordStore>) -> (Arc<RecordingProcessor>, SyncBridge) {
    let processor = Arc::new(RecordingProcessor::new());
    let bridge = SyncBridge::new(processor.clone(), store.clone(), BridgeConfig::default());
    (processor, bridge)
}

#[test]
fn test_metadata_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        let (processor, bridge) = connect(&store);

        let mut mcl = bridge.create_metadata_change_list();
        assert_ok(bridge.merge_sync_data(&mut mcl, vec![make_remote_add("remote")]));
        assert_ok(bridge.write_local(|scope| scope.add(&make_record("local"))));
        assert_eq!(processor.puts()[0].0, StorageKey::from("2"));
    }

    let store = open_store(&dir);
    let (processor, _bridge) = connect(&store);

    let loaded = processor.model_ready_batches();
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].model_state.initial_sync_done);
    assert_eq!(loaded[0].entities.len(), 2);
    assert_eq!(loaded[0].entities[&StorageKey::from("2")].sequence_number, 1);
    assert_eq!(assert_ok(store.record_count()), 2);
}

#[test]
fn test_remote_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (processor, bridge) = connect(&store);
    let mut mcl = bridge.create_metadata_change_list();

    assert_ok(bridge.apply_sync_changes(&mut mcl, vec![make_remote_add("abc")]));
    let key = processor.storage_key_updates()[0].0.clone();
    assert_eq!(key, StorageKey::from("1"));

    let mut data = make_remote_entity("abc", "server-abc");
    data.specifics.password_value = "rotated".to_string();
    assert_ok(bridge.apply_sync_changes(&mut mcl, vec![EntityChange::create_update(key.clone(), data)]));
    let record = assert_ok(store.get_record(PrimaryKey(1))).unwrap();
    assert_eq!(record.password_value, "rotated");

    assert_ok(bridge.apply_sync_changes(&mut mcl, vec![EntityChange::create_delete(key)]));
    assert_eq!(assert_ok(store.record_count()), 0);
    assert!(assert_ok(store.get_all_sync_metadata()).entities.is_empty());
    assert!(processor.puts().is_empty());
    assert!(processor.deletes().is_empty());
}

#[test]
fn test_remote_add_replaces_same_credential() {
    let store = Arc::new(assert_ok(SqliteRecordStore::in_memory()));
    let (processor, bridge) = connect(&store);
    assert_ok(bridge.write_local(|scope| scope.add(&make_record("abc"))));
    assert!(assert_ok(store.get_all_sync_metadata()).entities.contains_key(&StorageKey::from("1")));

    let mut mcl = bridge.create_metadata_change_list();
    assert_ok(bridge.apply_sync_changes(&mut mcl, vec![make_remote_add("abc")]));

    let records = assert_ok(store.read_all());
    assert_eq!(records.keys().copied().collect::<Vec<_>>(), vec![PrimaryKey(2)]);
    let metadata = assert_ok(store.get_all_sync_metadata());
    assert!(!metadata.entities.contains_key(&StorageKey::from("1")));
    assert!(metadata.entities.contains_key(&StorageKey::from("2")));
    assert_eq!(processor.storage_key_updates()[0].0, StorageKey::from("2"));
}

#[test]
fn test_failed_local_write_rolls_back() {
    let store = Arc::new(assert_ok(SqliteRecordStore::in_memory()));
    let (processor, bridge) = connect(&store);

    let result = bridge.write_local(|scope| {
        scope.add(&make_record("abc"))?;
        scope.add(&make_record("def"))?;
        Err::<(), _>(BridgeError::InvalidEntity("rejected".to_string()))
    });

    assert_bridge_err(result);
    assert_eq!(assert_ok(store.record_count()), 0);
    assert_nothing_forwarded(&processor);

    // The connection is usable again after the rollback.
    assert_ok(bridge.write_local(|scope| scope.add(&make_record("abc"))));
    assert_eq!(processor.puts().len(), 1);
}

#[test]
fn test_invalid_entity_aborts_merge() {
    let store = Arc::new(assert_ok(SqliteRecordStore::in_memory()));
    let (processor, bridge) = connect(&store);
    let mut mcl = bridge.create_metadata_change_list();

    let err = assert_bridge_err(bridge.merge_sync_data(
        &mut mcl,
        vec![make_remote_add("abc"), EntityChange::create_delete(StorageKey::from("1"))],
    ));

    assert!(matches!(err, BridgeError::InvalidEntity(_)));
    assert_eq!(assert_ok(store.record_count()), 0);
    assert!(!assert_ok(store.get_all_sync_metadata()).model_state.initial_sync_done);
    assert!(processor.errors().is_empty());
}

#[tokio::test]
async fn test_subscribers_see_committed_batches() {
    let store = Arc::new(assert_ok(SqliteRecordStore::in_memory()));
    let mut rx = store.subscribe();
    let (_processor, bridge) = connect(&store);

    assert_ok(bridge.write_local(|scope| scope.add(&make_record("abc"))));
    let mut mcl = bridge.create_metadata_change_list();
    assert_ok(bridge.apply_sync_changes(&mut mcl, vec![make_remote_add("def")]));

    let local = rx.recv().await.unwrap();
    assert_eq!(local.origin, ChangeOrigin::Local);
    assert_eq!(local.changes[0].kind, ChangeKind::Add);

    let remote = rx.recv().await.unwrap();
    assert_eq!(remote.origin, ChangeOrigin::RemoteApplied);

    let json = serde_json::to_value(&remote).unwrap();
    assert_eq!(json["origin"], "RemoteApplied");
    assert_eq!(json["changes"][0]["primary_key"], 2);
}

fn remote_at_origin(origin: &str, password: &str) -> EntityChange {
    let mut data = make_remote_entity("abc", "server-1");
    data.specifics.origin = origin.to_string();
    data.specifics.password_value = password.to_string();
    EntityChange::create_add(data)
}

fn add_at_origin(store: &SqliteRecordStore, origin: &str) {
    let mut record = make_record("abc");
    record.origin = origin.to_string();
    assert_ok(store.add_record(&record));
}

#[test]
fn test_merge_picks_exact_spelling_among_shared_tag() {
    let store = Arc::new(assert_ok(SqliteRecordStore::in_memory()));
    add_at_origin(&store, "http://x.com");
    add_at_origin(&store, "http://x.com/");
    let (processor, bridge) = connect(&store);

    let mut mcl = bridge.create_metadata_change_list();
    let summary =
        assert_ok(bridge.merge_sync_data(&mut mcl, vec![remote_at_origin("http://x.com/", "remote")]));

    assert_eq!(summary, MergeSummary { matched: 1, remote_only: 0, local_only: 1 });
    assert_eq!(assert_ok(store.get_record(PrimaryKey(1))).unwrap().password_value, "password");
    assert_eq!(assert_ok(store.get_record(PrimaryKey(2))).unwrap().password_value, "remote");

    let puts = processor.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, StorageKey::from("1"));
    assert_eq!(puts[0].1.specifics.origin, "http://x.com");
    assert!(processor.storage_key_updates().is_empty());

    let metadata = assert_ok(store.get_all_sync_metadata());
    assert_eq!(metadata.entities[&StorageKey::from("2")].server_id, "server-1");
    assert!(metadata.entities[&StorageKey::from("1")].server_id.is_empty());
}

#[test]
fn test_merge_rekeys_other_spelling_of_origin() {
    let store = Arc::new(assert_ok(SqliteRecordStore::in_memory()));
    add_at_origin(&store, "http://x.com");
    let (processor, bridge) = connect(&store);

    let mut mcl = bridge.create_metadata_change_list();
    let summary =
        assert_ok(bridge.merge_sync_data(&mut mcl, vec![remote_at_origin("http://x.com/", "remote")]));

    assert_eq!(summary, MergeSummary { matched: 1, remote_only: 0, local_only: 0 });
    assert!(assert_ok(store.get_record(PrimaryKey(1))).is_none());
    let record = assert_ok(store.get_record(PrimaryKey(2))).unwrap();
    assert_eq!(record.origin, "http://x.com/");
    assert_eq!(record.password_value, "remote");

    assert!(processor.puts().is_empty());
    assert_eq!(processor.storage_key_updates()[0].0, StorageKey::from("2"));
    let metadata = assert_ok(store.get_all_sync_metadata());
    assert!(!metadata.entities.contains_key(&StorageKey::from("1")));
    assert_eq!(metadata.entities[&StorageKey::from("2")].server_id, "server-1");
}
