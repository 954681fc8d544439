//! SQLite-backed record store
//!
//! One connection behind a mutex: a transaction opened by
//! `begin_transaction` spans every call until commit or rollback. The same
//! connection holds the sync metadata tables, so metadata writes made inside
//! a batch commit or roll back together with the records.

use crate::config::StoreConfig;
use crate::core_bridge::errors::{BridgeError, BridgeResult};
use crate::core_bridge::keys::{PrimaryKey, StorageKey};
use crate::core_bridge::model::{ChangeBatch, ChangeList, ChangeRecord, NaturalKey, Record, Scheme};
use crate::core_bridge::processor::{EntityMetadata, MetadataBatch, ModelState};
use crate::core_bridge::store::migrations;
use crate::core_bridge::store::notifier::ChangeNotifier;
use crate::core_bridge::store::{ChangeObserver, MetadataStore, RecordStore};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Helper to convert poison errors into BridgeError
fn handle_poison<T>(_err: PoisonError<T>) -> BridgeError {
    BridgeError::StoreFailure("Lock poisoned: a thread panicked while holding the lock".to_string())
}

const RECORD_COLUMNS: &str = "id, origin_url, action_url, username_element, username_value, \
     password_element, password_value, signon_realm, scheme, preferred, blacklisted_by_user, \
     times_used, date_created, display_name, icon_url";

fn read_record(row: &Row<'_>) -> rusqlite::Result<(PrimaryKey, Record)> {
    let record = Record {
        origin: row.get(1)?,
        action: row.get(2)?,
        username_element: row.get(3)?,
        username_value: row.get(4)?,
        password_element: row.get(5)?,
        password_value: row.get(6)?,
        signon_realm: row.get(7)?,
        scheme: Scheme::from_i32(row.get(8)?),
        preferred: row.get(9)?,
        blacklisted_by_user: row.get(10)?,
        times_used: row.get(11)?,
        date_created: row.get(12)?,
        display_name: row.get(13)?,
        icon_url: row.get(14)?,
    };
    Ok((PrimaryKey(row.get(0)?), record))
}

/// Record store persisted in a SQLite database
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

impl SqliteRecordStore {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> BridgeResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(config.busy_timeout)?;
        if config.enable_wal {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "journal mode set");
        }

        info!(path = %path.as_ref().display(), "opened record store");
        Self::with_connection(conn)
    }

    /// Create a new in-memory store (for testing)
    pub fn in_memory() -> BridgeResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> BridgeResult<Self> {
        migrations::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn), notifier: ChangeNotifier::default() })
    }

    /// Replace the notifier with one buffering `capacity` batches
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.notifier = ChangeNotifier::new(capacity);
        self
    }

    /// Subscribe to committed batches asynchronously
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn record_count(&self) -> BridgeResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> BridgeResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(handle_poison)
    }

    fn lookup_natural_key(conn: &Connection, key: &NaturalKey) -> BridgeResult<Option<PrimaryKey>> {
        let id = conn
            .query_row(
                "SELECT id FROM records WHERE origin_url = ? AND username_element = ?
                 AND username_value = ? AND password_element = ? AND signon_realm = ?",
                params![
                    key.origin,
                    key.username_element,
                    key.username_value,
                    key.password_element,
                    key.signon_realm
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(PrimaryKey))
    }

    fn lookup_record(conn: &Connection, key: PrimaryKey) -> BridgeResult<Option<Record>> {
        let sql = format!("SELECT {} FROM records WHERE id = ?", RECORD_COLUMNS);
        let found = conn.query_row(&sql, params![key.value()], read_record).optional()?;
        Ok(found.map(|(_, record)| record))
    }

    fn write_payload(conn: &Connection, key: PrimaryKey, record: &Record) -> BridgeResult<ChangeList> {
        conn.execute(
            "UPDATE records SET action_url = ?, password_value = ?, scheme = ?, preferred = ?,
                 blacklisted_by_user = ?, times_used = ?, date_created = ?, display_name = ?,
                 icon_url = ?
             WHERE id = ?",
            params![
                record.action,
                record.password_value,
                record.scheme.as_i32(),
                record.preferred,
                record.blacklisted_by_user,
                record.times_used,
                record.date_created,
                record.display_name,
                record.icon_url,
                key.value(),
            ],
        )?;

        debug!(primary_key = %key, "record updated");
        Ok(vec![ChangeRecord::update(record.clone(), key)])
    }
}

impl RecordStore for SqliteRecordStore {
    fn read_all(&self) -> BridgeResult<BTreeMap<PrimaryKey, Record>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM records ORDER BY id", RECORD_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_record)?;

        let mut records = BTreeMap::new();
        for row in rows {
            let (key, record) = row?;
            records.insert(key, record);
        }
        Ok(records)
    }

    fn get_record(&self, key: PrimaryKey) -> BridgeResult<Option<Record>> {
        let conn = self.lock()?;
        Self::lookup_record(&conn, key)
    }

    fn find_by_natural_key(&self, key: &NaturalKey) -> BridgeResult<Option<PrimaryKey>> {
        let conn = self.lock()?;
        Self::lookup_natural_key(&conn, key)
    }

    fn add_record(&self, record: &Record) -> BridgeResult<ChangeList> {
        let conn = self.lock()?;
        let mut changes = ChangeList::new();

        // The natural key is UNIQUE: an add for an existing credential
        // replaces the old row under a new id.
        if let Some(old_key) = Self::lookup_natural_key(&conn, &record.natural_key())? {
            if let Some(old) = Self::lookup_record(&conn, old_key)? {
                conn.execute("DELETE FROM records WHERE id = ?", params![old_key.value()])?;
                changes.push(ChangeRecord::remove(old, old_key));
            }
        }

        conn.execute(
            "INSERT INTO records (origin_url, action_url, username_element, username_value,
                 password_element, password_value, signon_realm, scheme, preferred,
                 blacklisted_by_user, times_used, date_created, display_name, icon_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.origin,
                record.action,
                record.username_element,
                record.username_value,
                record.password_element,
                record.password_value,
                record.signon_realm,
                record.scheme.as_i32(),
                record.preferred,
                record.blacklisted_by_user,
                record.times_used,
                record.date_created,
                record.display_name,
                record.icon_url,
            ],
        )?;
        let key = PrimaryKey(conn.last_insert_rowid());
        changes.push(ChangeRecord::add(record.clone(), key));

        debug!(primary_key = %key, replaced = changes.len() > 1, "record added");
        Ok(changes)
    }

    fn update_record(&self, record: &Record) -> BridgeResult<ChangeList> {
        let conn = self.lock()?;
        let Some(key) = Self::lookup_natural_key(&conn, &record.natural_key())? else {
            return Ok(ChangeList::new());
        };
        Self::write_payload(&conn, key, record)
    }

    fn update_record_at(&self, key: PrimaryKey, record: &Record) -> BridgeResult<ChangeList> {
        let conn = self.lock()?;
        match Self::lookup_record(&conn, key)? {
            Some(existing) if existing.same_natural_key(record) => {
                Self::write_payload(&conn, key, record)
            }
            _ => Ok(ChangeList::new()),
        }
    }

    fn remove_record(&self, key: PrimaryKey) -> BridgeResult<ChangeList> {
        let conn = self.lock()?;
        let Some(record) = Self::lookup_record(&conn, key)? else {
            return Ok(ChangeList::new());
        };

        conn.execute("DELETE FROM records WHERE id = ?", params![key.value()])?;

        debug!(primary_key = %key, "record removed");
        Ok(vec![ChangeRecord::remove(record, key)])
    }

    fn begin_transaction(&self) -> BridgeResult<()> {
        self.lock()?.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit_transaction(&self) -> BridgeResult<()> {
        self.lock()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_transaction(&self) -> BridgeResult<()> {
        let conn = self.lock()?;
        // A failed COMMIT may already have ended the transaction.
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn notify_changes(&self, batch: &ChangeBatch) {
        self.notifier.notify(batch);
    }

    fn add_observer(&self, observer: Weak<dyn ChangeObserver>) {
        self.notifier.add_observer(observer);
    }

    fn metadata_store(&self) -> &dyn MetadataStore {
        self
    }
}

impl MetadataStore for SqliteRecordStore {
    fn get_all_sync_metadata(&self) -> BridgeResult<MetadataBatch> {
        let conn = self.lock()?;
        let mut batch = MetadataBatch::new();

        let state: Option<Vec<u8>> = conn
            .query_row("SELECT state FROM sync_model_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        if let Some(blob) = state {
            batch.set_model_state(bincode::deserialize(&blob)?);
        }

        let mut stmt = conn.prepare("SELECT storage_key, metadata FROM sync_entity_metadata")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))?;
        for row in rows {
            let (key, blob) = row?;
            let metadata: EntityMetadata = bincode::deserialize(&blob)?;
            batch.add_metadata(StorageKey::new(key), metadata);
        }

        Ok(batch)
    }

    fn update_sync_metadata(&self, key: &StorageKey, metadata: &EntityMetadata) -> BridgeResult<()> {
        let blob = bincode::serialize(metadata)?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO sync_entity_metadata (storage_key, metadata) VALUES (?, ?)",
                params![key.as_str(), blob],
            )
            .map_err(|e| BridgeError::MetadataPersistFailure(e.to_string()))?;
        Ok(())
    }

    fn clear_sync_metadata(&self, key: &StorageKey) -> BridgeResult<()> {
        self.lock()?
            .execute("DELETE FROM sync_entity_metadata WHERE storage_key = ?", params![key.as_str()])
            .map_err(|e| BridgeError::MetadataPersistFailure(e.to_string()))?;
        Ok(())
    }

    fn update_model_state(&self, state: &ModelState) -> BridgeResult<()> {
        let blob = bincode::serialize(state)?;
        self.lock()?
            .execute("INSERT OR REPLACE INTO sync_model_state (id, state) VALUES (1, ?)", params![blob])
            .map_err(|e| BridgeError::MetadataPersistFailure(e.to_string()))?;
        Ok(())
    }

    fn clear_model_state(&self) -> BridgeResult<()> {
        self.lock()?
            .execute("DELETE FROM sync_model_state", [])
            .map_err(|e| BridgeError::MetadataPersistFailure(e.to_string()))?;
        Ok(())
    }
}
