/*
    change.rs - Local store change notifications

    The local store answers every mutation with a list of change records.
    One committed transaction produces one ChangeBatch, tagged with where the
    mutation came from so observers can tell local edits from applied remote
    changes.
*/

use crate::core_bridge::keys::{storage_key, PrimaryKey, StorageKey};
use crate::core_bridge::model::Record;
use serde::{Deserialize, Serialize};

/// Kind of mutation the local store executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Update,
    Remove,
}

/// One mutation reported by the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub record: Record,
    pub primary_key: PrimaryKey,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, record: Record, primary_key: PrimaryKey) -> Self {
        ChangeRecord { kind, record, primary_key }
    }

    pub fn add(record: Record, primary_key: PrimaryKey) -> Self {
        Self::new(ChangeKind::Add, record, primary_key)
    }

    pub fn update(record: Record, primary_key: PrimaryKey) -> Self {
        Self::new(ChangeKind::Update, record, primary_key)
    }

    pub fn remove(record: Record, primary_key: PrimaryKey) -> Self {
        Self::new(ChangeKind::Remove, record, primary_key)
    }

    pub fn storage_key(&self) -> StorageKey {
        storage_key(self.primary_key)
    }
}

/// All change records of one transaction
pub type ChangeList = Vec<ChangeRecord>;

/// Where a batch of mutations originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOrigin {
    /// A write made on this device
    Local,
    /// Changes received from the remote side and applied locally
    RemoteApplied,
}

/// Post-commit notification for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub origin: ChangeOrigin,
    pub changes: ChangeList,
}

impl ChangeBatch {
    pub fn new(origin: ChangeOrigin, changes: ChangeList) -> Self {
        ChangeBatch { origin, changes }
    }

    pub fn local(changes: ChangeList) -> Self {
        Self::new(ChangeOrigin::Local, changes)
    }

    pub fn is_local(&self) -> bool {
        self.origin == ChangeOrigin::Local
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn primary_keys(&self) -> Vec<PrimaryKey> {
        self.changes.iter().map(|c| c.primary_key).collect()
    }
}
