//! Autorun Implementation
//!
//! An Autorun is a side-effecting computation that re-runs whenever a value
//! it read on its previous run changes.
//!
//! # How Autoruns Work
//!
//! 1. When created, the autorun runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. Before every run it unsubscribes from everything it read last time and
//!    re-subscribes to what it reads now. A property read on an earlier run
//!    but not the latest one no longer triggers it.
//!
//! 3. When any dependency changes, the autorun re-runs before the write
//!    returns (or when the enclosing batch closes).
//!
//! # Use Cases
//!
//! - The DOM-update half of every binding
//! - Viewmodel `autorun` definitions
//!
//! # Disposal
//!
//! Disposing unsubscribes from every source and is idempotent. A disposed
//! autorun never runs again.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{Dependents, Reactive, SubscriberId};

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Property::new("count", json!(0));
///
/// let reader = count.clone();
/// let autorun = Autorun::new(move || {
///     println!("Count is: {}", reader.get());
/// });
///
/// count.set(json!(5));  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Autorun {
    inner: Arc<AutorunInner>,
}

struct AutorunInner {
    id: SubscriberId,
    this: Weak<AutorunInner>,
    run: Box<dyn Fn() + Send + Sync>,
    sources: Mutex<Vec<Arc<Dependents>>>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

/// Clears the running flag even if the autorun body panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Autorun {
    /// Create a new autorun with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let autorun = Self::new_lazy(run);
        autorun.inner.execute();
        autorun
    }

    /// Create a new autorun without running it.
    ///
    /// It has no dependencies until [`Autorun::execute`] is first called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| AutorunInner {
            id: SubscriberId::new(),
            this: this.clone(),
            run: Box::new(run),
            sources: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        Self { inner }
    }

    /// Get the subscriber ID for this autorun.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the function now, re-tracking dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the autorun.
    ///
    /// Returns `true` if this call disposed it, `false` if it already was.
    pub fn dispose(&self) -> bool {
        self.inner.dispose()
    }

    /// Check if the autorun has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the autorun has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of sources read on the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }
}

impl AutorunInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let _running = RunningGuard(&self.running);

        self.unsubscribe_all();

        let sources = {
            let subscriber: Weak<dyn Reactive> = self.this.clone();
            let _ctx = ReactiveContext::enter(self.id, subscriber);
            (self.run)();
            ReactiveContext::take_dependencies()
        };

        // Disposed mid-run (a binding torn down by its own update): drop
        // the fresh subscriptions instead of keeping them.
        if self.disposed.load(Ordering::SeqCst) {
            for source in &sources {
                source.unsubscribe(self.id);
            }
        } else {
            *self.sources.lock() = sources;
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    fn unsubscribe_all(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources {
            source.unsubscribe(self.id);
        }
    }

    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.unsubscribe_all();
        true
    }
}

impl Reactive for AutorunInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn invalidate(self: Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.load(Ordering::SeqCst) {
            tracing::trace!(subscriber = ?self.id, "ignoring invalidation of a running autorun");
            return;
        }
        Runtime::schedule(self);
    }

    fn run(&self) {
        self.execute();
    }
}

impl std::fmt::Debug for Autorun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autorun")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
