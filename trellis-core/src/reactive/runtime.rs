//! Reactive Runtime
//!
//! The runtime coordinates re-execution of invalidated computations.
//!
//! # How It Works
//!
//! 1. When a property changes, it invalidates every computation that read it
//!    on its last run.
//!
//! 2. Invalidated computations are queued with the runtime. The queue is
//!    keyed by subscriber ID, so a computation invalidated several times
//!    before the queue drains runs once.
//!
//! 3. The queue drains synchronously when the outermost batch closes. Every
//!    property write is its own batch, so dependents have re-run before the
//!    write returns.
//!
//! Grouping writes with [`Runtime::batch`] defers the drain until all the
//! writes are visible. The binding engine does this when pushing DOM state
//! into a viewmodel.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::subscriber::{Reactive, SubscriberId};

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: IndexMap<SubscriberId, Arc<dyn Reactive>>,
}

/// Keeps the batch depth balanced even if a computation panics.
struct BatchGuard;

impl BatchGuard {
    fn open() -> Self {
        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            if batch.depth == 0 {
                batch.pending.clear();
            }
        });
    }
}

/// The reactive runtime for the current thread.
pub struct Runtime;

impl Runtime {
    /// Run `f` with invalidations deferred until it returns.
    ///
    /// Batches nest; only the outermost one drains the queue.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let _guard = BatchGuard::open();
        let result = f();
        if Self::depth() == 1 {
            Self::flush();
        }
        result
    }

    /// Queue a computation, or run it right away outside of a batch.
    pub fn schedule(reactive: Arc<dyn Reactive>) {
        let queued = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            if batch.depth == 0 {
                return false;
            }
            batch
                .pending
                .entry(reactive.subscriber_id())
                .or_insert_with(|| Arc::clone(&reactive));
            true
        });

        if !queued {
            reactive.run();
        }
    }

    /// Whether writes are currently being batched.
    pub fn is_batching() -> bool {
        Self::depth() > 0
    }

    /// Number of computations waiting for the current batch to close.
    pub fn pending_count() -> usize {
        BATCH.with(|batch| batch.borrow().pending.len())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    fn depth() -> usize {
        BATCH.with(|batch| batch.borrow().depth)
    }

    /// Drain the queue in first-invalidated order.
    ///
    /// The depth stays at one while draining, so anything invalidated by a
    /// running computation joins the queue instead of nesting.
    fn flush() {
        loop {
            let next = BATCH.with(|batch| batch.borrow_mut().pending.shift_remove_index(0));
            match next {
                Some((id, reactive)) => {
                    tracing::trace!(subscriber = ?id, "re-running invalidated computation");
                    reactive.run();
                }
                None => break,
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
