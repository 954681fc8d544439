//! Custom assertions for bridge tests
//!
//! Provides expressive assertion helpers that improve test readability
//! and provide better error messages.

use crate::core_bridge::errors::{BridgeError, BridgeResult};
use crate::test_utils::fake_processor::RecordingProcessor;
use std::fmt::Debug;

/// Assert that a Result is Ok and return the value
pub fn assert_ok<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}

/// Assert that a bridge call failed and return the error
pub fn assert_bridge_err<T: Debug>(result: BridgeResult<T>) -> BridgeError {
    match result {
        Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
        Err(e) => e,
    }
}

/// Assert the processor saw no put, delete or storage key update
pub fn assert_nothing_forwarded(processor: &RecordingProcessor) {
    let puts = processor.puts();
    let deletes = processor.deletes();
    let updates = processor.storage_key_updates();
    if !puts.is_empty() || !deletes.is_empty() || !updates.is_empty() {
        panic!(
            "Expected no forwarded changes, got puts: {:?}, deletes: {:?}, key updates: {:?}",
            puts, deletes, updates
        );
    }
}
