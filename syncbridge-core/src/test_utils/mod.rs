//! Test utilities and helpers for the sync bridge
//!
//! In-memory collaborators that record every call, plus fixtures and
//! assertions shared by unit tests, integration tests and benches.

pub mod assertions;
pub mod fake_processor;
pub mod fake_store;
pub mod fixtures;

pub use assertions::*;
pub use fake_processor::{ProcessorCall, RecordingProcessor};
pub use fake_store::{FakeMetadataStore, FakeRecordStore, StoreCall};
pub use fixtures::*;
