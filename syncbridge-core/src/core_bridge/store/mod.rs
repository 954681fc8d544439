/*
    Store - Local record store and metadata persistence
*/

pub mod migrations;
pub mod notifier;
pub mod sqlite_store;
pub mod traits;

pub use notifier::ChangeNotifier;
pub use sqlite_store::SqliteRecordStore;
pub use traits::{ChangeObserver, MetadataStore, RecordStore};
