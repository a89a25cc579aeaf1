//! Computed Implementation
//!
//! A Computed is a cached derived value, defined on a viewmodel alongside
//! its plain properties. It re-evaluates only when its dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its function and caches the result.
//!
//! 2. When accessed again with no dependency changed, the cache is returned.
//!
//! 3. When a dependency changes, the computed is marked dirty. If nothing
//!    depends on it, that is all: it recomputes lazily on the next read.
//!
//! 4. If something does depend on it, it recomputes as part of the current
//!    batch and only invalidates its own dependents when the new value
//!    differs from the cached one.
//!
//! Step 4 is the equality cut-off: an autorun reading `is_adult` does not
//! re-run when `age` goes from 30 to 31.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{Dependents, Reactive, SubscriberId};

/// Dirty state for a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the value was cached.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

struct ComputedInner {
    id: SubscriberId,
    this: Weak<ComputedInner>,
    name: String,
    compute: Box<dyn Fn() -> Value + Send + Sync>,
    value: RwLock<Option<Value>>,
    state: RwLock<ComputedState>,
    /// Sources read on the last evaluation.
    sources: Mutex<Vec<Arc<Dependents>>>,
    /// Computations that read this computed.
    dependents: Arc<Dependents>,
    disposed: AtomicBool,
}

impl Computed {
    /// Create a new computed with the given function.
    ///
    /// The function is not run until the value is first read.
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let inner = Arc::new_cyclic(|this| ComputedInner {
            id: SubscriberId::new(),
            this: this.clone(),
            name,
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(ComputedState::Dirty),
            sources: Mutex::new(Vec::new()),
            dependents: Dependents::new(),
            disposed: AtomicBool::new(false),
        });
        Self { inner }
    }

    /// Get the computed's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the subscriber ID for this computed.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Tracks the computed as a dependency of the running computation.
    pub fn get(&self) -> Value {
        self.inner.dependents.track();
        self.get_untracked()
    }

    /// Get the current value without tracking, recomputing if necessary.
    pub fn get_untracked(&self) -> Value {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return inner.value.read().clone().unwrap_or(Value::Null);
        }

        let fresh = *inner.state.read() == ComputedState::Clean;
        if fresh {
            if let Some(value) = inner.value.read().clone() {
                return value;
            }
        }
        inner.recompute()
    }

    /// Force the next read to recompute.
    pub fn mark_dirty(&self) {
        *self.inner.state.write() = ComputedState::Dirty;
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.read()
    }

    /// Whether a value has ever been computed.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Get the number of computations depending on this computed.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.len()
    }

    /// Stop tracking sources. The last value stays readable.
    pub fn dispose(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.unsubscribe_all();
        true
    }
}

impl ComputedInner {
    fn recompute(&self) -> Value {
        self.unsubscribe_all();

        let (new_value, sources) = {
            let subscriber: Weak<dyn Reactive> = self.this.clone();
            let _ctx = ReactiveContext::enter(self.id, subscriber);
            let value = (self.compute)();
            (value, ReactiveContext::take_dependencies())
        };
        *self.sources.lock() = sources;

        let changed = {
            let mut cached = self.value.write();
            let changed = cached.as_ref().is_some_and(|old| *old != new_value);
            *cached = Some(new_value.clone());
            changed
        };
        *self.state.write() = ComputedState::Clean;

        if changed {
            self.dependents.notify();
        }

        new_value
    }

    fn unsubscribe_all(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources {
            source.unsubscribe(self.id);
        }
    }
}

impl Reactive for ComputedInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn invalidate(self: Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        *self.state.write() = ComputedState::Dirty;
        if !self.dependents.is_empty() {
            Runtime::schedule(self);
        }
    }

    fn run(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if *self.state.read() == ComputedState::Dirty {
            self.recompute();
        }
    }
}

impl Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Autorun, Property};
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computed_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new("answer", move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            json!(42)
        });

        assert!(!computed.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get(), json!(42));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new("answer", move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            json!(42)
        });

        computed.get();
        computed.get();
        computed.get();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_without_dependents_recomputes_lazily() {
        let age = Property::new("age", json!(10));
        let reader = age.clone();
        let doubled = Computed::new("doubled", move || {
            json!(reader.get().as_i64().unwrap_or(0) * 2)
        });

        assert_eq!(doubled.get(), json!(20));

        age.set(json!(21));
        assert_eq!(doubled.state(), ComputedState::Dirty);
        assert_eq!(doubled.get(), json!(42));
        assert_eq!(doubled.state(), ComputedState::Clean);
    }

    #[test]
    fn unchanged_result_does_not_rerun_dependents() {
        let age = Property::new("age", json!(30));
        let reader = age.clone();
        let adult = Computed::new("adult", move || json!(reader.get().as_i64().unwrap_or(0) >= 18));

        let observed = adult.clone();
        let autorun = Autorun::new(move || {
            observed.get();
        });
        assert_eq!(autorun.run_count(), 1);

        age.set(json!(31));
        assert_eq!(autorun.run_count(), 1);

        age.set(json!(12));
        assert_eq!(autorun.run_count(), 2);
        assert_eq!(adult.get(), json!(false));
    }

    #[test]
    fn diamond_dependency_runs_dependent_once() {
        let base = Property::new("base", json!(1));
        let reader = base.clone();
        let plus_one = Computed::new("plus_one", move || json!(reader.get().as_i64().unwrap_or(0) + 1));

        let (b, p) = (base.clone(), plus_one.clone());
        let autorun = Autorun::new(move || {
            b.get();
            p.get();
        });

        base.set(json!(5));
        assert_eq!(autorun.run_count(), 2);
        assert_eq!(plus_one.get(), json!(6));
    }

    #[test]
    fn computed_state_transitions() {
        let computed = Computed::new("answer", || json!(42));

        assert_eq!(computed.state(), ComputedState::Dirty);

        computed.get();
        assert_eq!(computed.state(), ComputedState::Clean);

        computed.mark_dirty();
        assert_eq!(computed.state(), ComputedState::Dirty);

        computed.get();
        assert_eq!(computed.state(), ComputedState::Clean);
    }

    #[test]
    fn disposed_computed_keeps_last_value() {
        let base = Property::new("base", json!(1));
        let reader = base.clone();
        let computed = Computed::new("copy", move || reader.get());

        assert_eq!(computed.get(), json!(1));
        assert!(computed.dispose());
        assert!(!computed.dispose());

        base.set(json!(2));
        assert_eq!(computed.get(), json!(1));
        assert_eq!(base.subscriber_count(), 0);
    }
}
