/*
    entity.rs - Wire-side representation of records

    RecordSpecifics is the payload the remote side stores; EntityData wraps
    it with the envelope fields the change processor tracks. The mapping
    between Record and RecordSpecifics is pure and lossless.
*/

use crate::core_bridge::identity::{client_tag, client_tag_hash};
use crate::core_bridge::keys::StorageKey;
use crate::core_bridge::model::{Record, Scheme};
use serde::{Deserialize, Serialize};

/// Serialized form of a record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordSpecifics {
    pub origin: String,
    pub action: String,
    pub username_element: String,
    pub username_value: String,
    pub password_element: String,
    pub password_value: String,
    pub signon_realm: String,
    pub scheme: i32,
    pub preferred: bool,
    pub blacklisted: bool,
    pub times_used: i64,
    pub date_created: i64,
    pub display_name: String,
    pub icon_url: String,
}

impl From<&Record> for RecordSpecifics {
    fn from(record: &Record) -> Self {
        RecordSpecifics {
            origin: record.origin.clone(),
            action: record.action.clone(),
            username_element: record.username_element.clone(),
            username_value: record.username_value.clone(),
            password_element: record.password_element.clone(),
            password_value: record.password_value.clone(),
            signon_realm: record.signon_realm.clone(),
            scheme: record.scheme.as_i32(),
            preferred: record.preferred,
            blacklisted: record.blacklisted_by_user,
            times_used: record.times_used,
            date_created: record.date_created,
            display_name: record.display_name.clone(),
            icon_url: record.icon_url.clone(),
        }
    }
}

impl From<&RecordSpecifics> for Record {
    fn from(specifics: &RecordSpecifics) -> Self {
        Record {
            origin: specifics.origin.clone(),
            action: specifics.action.clone(),
            username_element: specifics.username_element.clone(),
            username_value: specifics.username_value.clone(),
            password_element: specifics.password_element.clone(),
            password_value: specifics.password_value.clone(),
            signon_realm: specifics.signon_realm.clone(),
            scheme: Scheme::from_i32(specifics.scheme),
            preferred: specifics.preferred,
            blacklisted_by_user: specifics.blacklisted,
            times_used: specifics.times_used,
            date_created: specifics.date_created,
            display_name: specifics.display_name.clone(),
            icon_url: specifics.icon_url.clone(),
        }
    }
}

/// Entity envelope exchanged with the change processor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityData {
    /// Hash of the client tag, empty until computed
    pub client_tag_hash: String,

    /// Server-assigned id, empty for entities not yet committed
    pub id: String,

    /// Human readable label
    pub name: String,

    pub specifics: RecordSpecifics,

    /// Microseconds since the Unix epoch
    pub creation_time: i64,
    pub modification_time: i64,
}

impl EntityData {
    /// Wrap specifics that came from the remote side
    pub fn from_specifics(specifics: RecordSpecifics) -> Self {
        let tag = client_tag(&specifics);
        EntityData {
            client_tag_hash: client_tag_hash(&tag),
            name: specifics.signon_realm.clone(),
            creation_time: specifics.date_created,
            specifics,
            ..Default::default()
        }
    }

    pub fn to_record(&self) -> Record {
        Record::from(&self.specifics)
    }
}

/// Build the payload uploaded for a local record
pub fn entity_from_record(record: &Record) -> EntityData {
    EntityData::from_specifics(RecordSpecifics::from(record))
}

/// Kind of change arriving from the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityChangeKind {
    Add,
    Update,
    Delete,
}

/// One remote-origin change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    pub kind: EntityChangeKind,

    /// Empty for additions: the local store has not assigned a key yet
    pub storage_key: StorageKey,

    /// Absent for deletions
    pub data: Option<EntityData>,
}

impl EntityChange {
    pub fn create_add(data: EntityData) -> Self {
        EntityChange { kind: EntityChangeKind::Add, storage_key: StorageKey::new(""), data: Some(data) }
    }

    pub fn create_update(storage_key: StorageKey, data: EntityData) -> Self {
        EntityChange { kind: EntityChangeKind::Update, storage_key, data: Some(data) }
    }

    pub fn create_delete(storage_key: StorageKey) -> Self {
        EntityChange { kind: EntityChangeKind::Delete, storage_key, data: None }
    }
}

/// Remote changes delivered in one call
pub type EntityChangeList = Vec<EntityChange>;

/// Records handed to the change processor, keyed by storage key
pub type DataBatch = Vec<(StorageKey, EntityData)>;
