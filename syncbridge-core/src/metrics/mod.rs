//! Metrics collection for observability

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

mod collector;

pub use collector::{BridgeStats, MetricsCollector};

pub const BATCH_COMMITTED: &str = "bridge.batch.committed";
pub const BATCH_ROLLED_BACK: &str = "bridge.batch.rolled_back";
pub const BATCH_SIZE: &str = "bridge.batch.size";
pub const MERGE_MATCHED: &str = "bridge.merge.matched";
pub const MERGE_REMOTE_ONLY: &str = "bridge.merge.remote_only";
pub const MERGE_LOCAL_ONLY: &str = "bridge.merge.local_only";
pub const MERGE_DURATION: &str = "bridge.merge.duration_ms";
pub const APPLY_CHANGES: &str = "bridge.apply.changes";
pub const APPLY_FAILED: &str = "bridge.apply.failed";
pub const APPLY_DURATION: &str = "bridge.apply.duration_ms";
pub const RELAY_PUT: &str = "bridge.relay.put";
pub const RELAY_DELETE: &str = "bridge.relay.delete";
pub const RELAY_SKIPPED: &str = "bridge.relay.skipped";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Batch metrics
    describe_counter!(BATCH_COMMITTED, "Number of committed change batches");
    describe_counter!(BATCH_ROLLED_BACK, "Number of change batches rolled back");
    describe_histogram!(BATCH_SIZE, "Change records per committed batch");

    // Merge metrics
    describe_counter!(MERGE_MATCHED, "Remote entities matched to a local record at merge");
    describe_counter!(MERGE_REMOTE_ONLY, "Remote entities materialised locally at merge");
    describe_counter!(MERGE_LOCAL_ONLY, "Local records uploaded at merge");
    describe_histogram!(MERGE_DURATION, "Initial merge duration in milliseconds");

    // Apply metrics
    describe_counter!(APPLY_CHANGES, "Remote changes applied to the local store");
    describe_counter!(APPLY_FAILED, "Remote change invocations that failed");
    describe_histogram!(APPLY_DURATION, "Incremental apply duration in milliseconds");

    // Relay metrics
    describe_counter!(RELAY_PUT, "Local additions and updates forwarded to the processor");
    describe_counter!(RELAY_DELETE, "Local removals forwarded to the processor");
    describe_counter!(RELAY_SKIPPED, "Notification batches the relay did not forward");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}
