//! Change notification fan-out
//!
//! Synchronous observers (the local-origin relay) are called inline, in
//! registration order, right after a commit. Asynchronous listeners can
//! subscribe to a tokio broadcast channel carrying the same batches.

use crate::core_bridge::model::ChangeBatch;
use crate::core_bridge::store::ChangeObserver;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of batches buffered for slow async subscribers
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Fans committed change batches out to observers and subscribers
///
/// Observers are held weakly: dropping the owner of an observer
/// unregisters it.
pub struct ChangeNotifier {
    observers: RwLock<Vec<Weak<dyn ChangeObserver>>>,
    tx: broadcast::Sender<ChangeBatch>,
}

impl ChangeNotifier {
    /// Create a notifier
    ///
    /// # Arguments
    /// * `capacity` - Broadcast channel capacity (number of batches buffered)
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { observers: RwLock::new(Vec::new()), tx }
    }

    pub fn add_observer(&self, observer: Weak<dyn ChangeObserver>) {
        self.observers.write().unwrap_or_else(PoisonError::into_inner).push(observer);
    }

    /// Deliver a batch; returns how many synchronous observers saw it
    pub fn notify(&self, batch: &ChangeBatch) -> usize {
        // Upgrade outside the callbacks so an observer may register others.
        let live: Vec<Arc<dyn ChangeObserver>> = {
            let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in &live {
            observer.on_changes(batch);
        }

        let subscribers = self.tx.send(batch.clone()).unwrap_or(0);
        trace!(observers = live.len(), subscribers, changes = batch.len(), "change batch delivered");

        live.len()
    }

    /// Subscribe to batches asynchronously
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}
