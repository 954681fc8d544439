/*
    Model - Records, local change notifications and wire entities
*/

pub mod change;
pub mod entity;
pub mod record;

pub use change::{ChangeBatch, ChangeKind, ChangeList, ChangeOrigin, ChangeRecord};
pub use entity::{
    entity_from_record, DataBatch, EntityChange, EntityChangeKind, EntityChangeList, EntityData,
    RecordSpecifics,
};
pub use record::{NaturalKey, Record, Scheme};
