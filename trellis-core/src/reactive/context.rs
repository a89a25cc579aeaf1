//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a property is read,
//! the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When a computation (autorun, computed, binding update) runs, it pushes
//! itself onto the stack; the guard pops it when the run completes.
//!
//! The stack is scoped to the UI thread, so nested computations (a computed
//! read from inside an autorun) each collect their own dependencies.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::subscriber::{Dependents, Reactive, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The subscriber ID of the current computation.
    subscriber_id: SubscriberId,
    /// Handle used to subscribe the computation to the sources it reads.
    subscriber: Weak<dyn Reactive>,
    /// Sources read during this run, deduplicated, in first-read order.
    dependencies: Vec<Arc<Dependents>>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the context stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While the guard is alive, every tracked read subscribes `subscriber`
    /// to the source being read.
    pub fn enter(subscriber_id: SubscriberId, subscriber: Weak<dyn Reactive>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                subscriber,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a dependency of the current computation on `source`.
    ///
    /// Does nothing outside a reactive context. Reading the same source
    /// twice in one run subscribes once.
    pub fn track_dependency(source: &Arc<Dependents>) {
        let subscription = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            if entry.dependencies.iter().any(|dep| dep.id() == source.id()) {
                return None;
            }
            entry.dependencies.push(Arc::clone(source));
            Some((entry.subscriber_id, entry.subscriber.clone()))
        });

        // Subscribe outside the stack borrow; the source takes its own lock.
        if let Some((id, subscriber)) = subscription {
            source.subscribe(id, subscriber);
        }
    }

    /// Take the dependencies collected in the current context.
    pub fn take_dependencies() -> Vec<Arc<Dependents>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
