/*
    Core bridge - Record synchronization between a local store and a
    remote change processor

    Leaves first:
    - identity: client tags for cross-replica matching
    - keys: primary key <-> storage key translation
    - batch: transactional grouping of local mutations
    - sync: initial merge, incremental apply, local-origin relay
    - bridge: the facade the change processor drives
*/

pub mod batch;
pub mod bridge;
pub mod errors;
pub mod identity;
pub mod keys;
pub mod model;
pub mod processor;
pub mod store;
pub mod sync;

pub use batch::{BatchOutcome, BatchScope, ChangeBatcher};
pub use bridge::SyncBridge;
pub use errors::{BridgeError, BridgeResult};
pub use identity::{client_tag, client_tag_hash};
pub use keys::{primary_key, storage_key, PrimaryKey, StorageKey};
pub use model::{
    entity_from_record, ChangeBatch, ChangeKind, ChangeList, ChangeOrigin, ChangeRecord, DataBatch,
    EntityChange, EntityChangeKind, EntityChangeList, EntityData, NaturalKey, Record,
    RecordSpecifics, Scheme,
};
pub use processor::{
    ChangeProcessor, EntityMetadata, InMemoryMetadataChangeList, MetadataBatch,
    MetadataChangeList, ModelState, StoreMetadataChangeList,
};
pub use store::{ChangeNotifier, ChangeObserver, MetadataStore, RecordStore, SqliteRecordStore};
pub use sync::{ApplySummary, LocalOriginRelay, MergeSummary};
