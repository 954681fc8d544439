//! In-process bridge statistics
//!
//! The `metrics` facade only records when an exporter is installed; the
//! collector keeps the same counts locally so callers can report them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the collector's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub batches_committed: u64,
    pub batches_rolled_back: u64,
    pub remote_changes_applied: u64,
    pub local_changes_relayed: u64,
    pub relay_batches_skipped: u64,
}

/// Metrics collector for aggregating bridge activity
#[derive(Debug, Default)]
pub struct MetricsCollector {
    batches_committed: AtomicU64,
    batches_rolled_back: AtomicU64,
    remote_changes_applied: AtomicU64,
    local_changes_relayed: AtomicU64,
    relay_batches_skipped: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_committed(&self) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rolled_back(&self) {
        self.batches_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_applied(&self, count: u64) {
        self.remote_changes_applied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_relayed(&self, count: u64) {
        self.local_changes_relayed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_relay_skipped(&self) {
        self.relay_batches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current counters
    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_rolled_back: self.batches_rolled_back.load(Ordering::Relaxed),
            remote_changes_applied: self.remote_changes_applied.load(Ordering::Relaxed),
            local_changes_relayed: self.local_changes_relayed.load(Ordering::Relaxed),
            relay_batches_skipped: self.relay_batches_skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let collector = MetricsCollector::new();
        collector.inc_committed();
        collector.inc_committed();
        collector.add_relayed(3);

        let stats = collector.snapshot();
        assert_eq!(stats.batches_committed, 2);
        assert_eq!(stats.local_changes_relayed, 3);
        assert_eq!(stats.batches_rolled_back, 0);
    }
}
