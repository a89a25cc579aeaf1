//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: autoruns,
//! computed properties, and the DOM-update side of a binding. A
//! [`Dependents`] set is the other end of the edge: every reactive source
//! (property or computed) owns one and notifies it on change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::runtime::Runtime;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID is used to track
/// dependencies and avoid duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be invalidated by its sources.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Called by a source when a value this computation read has changed.
    ///
    /// Implementations decide whether to re-run now, queue themselves with
    /// the [`Runtime`], or just mark themselves dirty.
    fn invalidate(self: Arc<Self>);

    /// Re-run the computation. Called by the runtime when flushing.
    fn run(&self);
}

/// The set of computations that depend on one reactive source.
///
/// Entries are weak so a source never keeps a dropped computation alive.
/// Insertion order is preserved, which makes notification order
/// deterministic: first subscriber, first notified.
pub struct Dependents {
    id: u64,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Reactive>>>,
}

impl Dependents {
    /// Create an empty dependent set with a fresh source ID.
    pub fn new() -> Arc<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Arc::new(Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    /// The unique ID of the source owning this set.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register the currently running computation, if any, as a dependent.
    pub fn track(self: &Arc<Self>) {
        super::context::ReactiveContext::track_dependency(self);
    }

    /// Add a subscriber.
    pub fn subscribe(&self, id: SubscriberId, subscriber: Weak<dyn Reactive>) {
        self.subscribers.lock().insert(id, subscriber);
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    /// Invalidate every live subscriber.
    ///
    /// The subscriber list is snapshotted first, so subscribers may
    /// re-subscribe or unsubscribe while being notified. The whole pass runs
    /// inside a batch: a computation reachable along several paths runs once.
    pub fn notify(&self) {
        let live: Vec<Arc<dyn Reactive>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|_, weak| weak.strong_count() > 0);
            subscribers.values().filter_map(Weak::upgrade).collect()
        };

        if live.is_empty() {
            return;
        }

        Runtime::batch(|| {
            for reactive in live {
                reactive.invalidate();
            }
        });
    }

    /// Number of subscribers, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether nothing depends on this source.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Dependents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependents")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        id: SubscriberId,
        runs: AtomicUsize,
    }

    impl Reactive for Counter {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn invalidate(self: Arc<Self>) {
            Runtime::schedule(self);
        }

        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn notify_runs_each_subscriber_once() {
        let dependents = Dependents::new();
        let counter = Arc::new(Counter {
            id: SubscriberId::new(),
            runs: AtomicUsize::new(0),
        });
        let weak: Weak<dyn Reactive> = Arc::downgrade(&counter) as Weak<dyn Reactive>;

        dependents.subscribe(counter.id, weak.clone());
        dependents.subscribe(counter.id, weak);
        assert_eq!(dependents.len(), 1);

        dependents.notify();
        assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let dependents = Dependents::new();
        {
            let counter = Arc::new(Counter {
                id: SubscriberId::new(),
                runs: AtomicUsize::new(0),
            });
            dependents.subscribe(counter.id, Arc::downgrade(&counter) as Weak<dyn Reactive>);
        }

        assert_eq!(dependents.len(), 1);
        dependents.notify();
        assert!(dependents.is_empty());
    }
}
