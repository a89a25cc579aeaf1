//! Viewmodels
//!
//! A viewmodel is the reactive property container attached to one view. It
//! holds named slots (plain properties and computeds) in declaration order,
//! the autoruns started for it, and a weak link back to its view.
//!
//! # Lookup
//!
//! [`ViewModel::get`] and [`ViewModel::set`] resolve names nearest-first:
//! the viewmodel itself, then the viewmodels of enclosing views. A child may
//! shadow an ancestor's property by defining its own.
//!
//! # Merging
//!
//! [`ViewModel::add_props`] is additive. A property that already exists keeps
//! its current value; only a computed is replaced when redefined. Readers
//! that looked the slot up with [`ViewModel::slot_tracked`] re-run when that
//! happens and pick up the new computed.

mod definition;
mod hierarchy;

pub use definition::{
    is_reserved, ComputeFn, Definition, Initial, ViewModelEventHandler, ViewModelHook,
    RESERVED_NAMES,
};
pub use hierarchy::{split_path, Hierarchy};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::{BindError, Result};
use crate::reactive::{Autorun, Computed, Dependents, Property, Runtime};
use crate::template::{View, WeakView};

/// Name of the process-wide viewmodel.
pub const GLOBAL_NAME: &str = "global";

/// Unique identifier for a viewmodel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewModelId(u64);

impl ViewModelId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// One named slot of a viewmodel.
#[derive(Clone, Debug)]
pub enum Slot {
    /// A plain read-write property.
    Value(Property),
    /// A read-only derived value.
    Computed(Computed),
}

impl Slot {
    /// Read, tracking the dependency.
    pub fn get(&self) -> Value {
        match self {
            Slot::Value(property) => property.get(),
            Slot::Computed(computed) => computed.get(),
        }
    }

    /// Read without tracking.
    pub fn get_untracked(&self) -> Value {
        match self {
            Slot::Value(property) => property.get_untracked(),
            Slot::Computed(computed) => computed.get_untracked(),
        }
    }

    /// Write. Returns whether the value changed.
    pub fn set(&self, value: Value) -> Result<bool> {
        match self {
            Slot::Value(property) => Ok(property.set(value)),
            Slot::Computed(computed) => Err(BindError::ReadOnly(computed.name().to_string())),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Slot::Computed(_))
    }
}

/// A reactive property container bound to a view.
#[derive(Clone)]
pub struct ViewModel {
    inner: Arc<ViewModelInner>,
}

struct ViewModelInner {
    id: ViewModelId,
    name: Option<String>,
    view: Option<WeakView>,
    slots: RwLock<IndexMap<String, Slot>>,
    autoruns: Mutex<Vec<Autorun>>,
    redefined: Arc<Dependents>,
    disposed: AtomicBool,
}

impl ViewModel {
    /// A viewmodel not attached to any view.
    pub fn new(name: Option<&str>) -> Self {
        Self::build(name, None)
    }

    /// A viewmodel attached to `view`. The caller still has to store it on
    /// the view with [`View::set_viewmodel`].
    pub fn for_view(view: &View, name: Option<&str>) -> Self {
        Self::build(name, Some(view.downgrade()))
    }

    /// The process-wide viewmodel, created on first use.
    pub fn global() -> ViewModel {
        static GLOBAL: OnceLock<ViewModel> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                tracing::debug!("creating the global viewmodel");
                ViewModel::new(Some(GLOBAL_NAME))
            })
            .clone()
    }

    fn build(name: Option<&str>, view: Option<WeakView>) -> Self {
        Self {
            inner: Arc::new(ViewModelInner {
                id: ViewModelId::new(),
                name: name.map(str::to_string),
                view,
                slots: RwLock::new(IndexMap::new()),
                autoruns: Mutex::new(Vec::new()),
                redefined: Dependents::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ViewModelId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The owning view, if it is still alive.
    pub fn view(&self) -> Option<View> {
        self.inner.view.as_ref().and_then(WeakView::upgrade)
    }

    pub fn is_global(&self) -> bool {
        self.inner.view.is_none() && self.name() == Some(GLOBAL_NAME)
    }

    /// Merge a definition into this viewmodel.
    ///
    /// New plain properties take their initial value (or the value restored
    /// for this view, in which case the initializer is skipped). Existing
    /// plain properties are left alone. Computeds are added or replaced.
    pub fn add_props(&self, definition: &Definition) -> Result<()> {
        definition.validate()?;
        let view = self.view();

        for (name, initial) in definition.props() {
            if self.inner.slots.read().contains_key(name) {
                continue;
            }
            let value = view
                .as_ref()
                .and_then(|view| view.take_seed(name))
                .unwrap_or_else(|| initial.evaluate());
            self.inner
                .slots
                .write()
                .insert(name.clone(), Slot::Value(Property::new(name.clone(), value)));
        }

        let mut replaced_any = false;
        for (name, compute) in definition.computeds() {
            let weak = Arc::downgrade(&self.inner);
            let compute = Arc::clone(compute);
            let computed = Computed::new(name.clone(), move || match weak.upgrade() {
                Some(inner) => compute(&ViewModel { inner }),
                None => Value::Null,
            });

            let replaced = self
                .inner
                .slots
                .write()
                .insert(name.clone(), Slot::Computed(computed));
            match replaced {
                Some(Slot::Computed(old)) => {
                    old.dispose();
                    replaced_any = true;
                }
                Some(Slot::Value(_)) => {
                    tracing::debug!(property = %name, "computed replaces a plain property");
                    replaced_any = true;
                }
                None => {}
            }
        }

        if replaced_any {
            self.inner.redefined.notify();
        }
        Ok(())
    }

    /// Start an autorun receiving this viewmodel. It is disposed with the
    /// viewmodel.
    pub fn autorun<F>(&self, run: F) -> Autorun
    where
        F: Fn(&ViewModel) + Send + Sync + 'static,
    {
        let weak: Weak<ViewModelInner> = Arc::downgrade(&self.inner);
        let autorun = Autorun::new(move || {
            if let Some(inner) = weak.upgrade() {
                run(&ViewModel { inner });
            }
        });

        if self.is_disposed() {
            autorun.dispose();
        } else {
            self.inner.autoruns.lock().push(autorun.clone());
        }
        autorun
    }

    /// The slot for `name` on this viewmodel only.
    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.inner.slots.read().get(name).cloned()
    }

    /// Like [`slot`](Self::slot), but the running computation also re-runs
    /// whenever `add_props` replaces a slot of this viewmodel.
    pub fn slot_tracked(&self, name: &str) -> Option<Slot> {
        self.inner.redefined.track();
        self.slot(name)
    }

    /// Whether this viewmodel itself defines `name`.
    pub fn has(&self, name: &str) -> bool {
        self.inner.slots.read().contains_key(name)
    }

    /// Property and computed names in declaration order.
    pub fn property_names(&self) -> Vec<String> {
        self.inner.slots.read().keys().cloned().collect()
    }

    /// Read `name` from the nearest viewmodel defining it.
    pub fn get(&self, name: &str) -> Result<Value> {
        Ok(self.resolve(name)?.get())
    }

    /// Write `name` on the nearest viewmodel defining it.
    pub fn set(&self, name: &str, value: Value) -> Result<bool> {
        self.resolve(name)?.set(value)
    }

    /// The slot for `name` here or on the nearest enclosing viewmodel.
    pub fn resolve(&self, name: &str) -> Result<Slot> {
        let mut cursor = Some(self.clone());
        while let Some(viewmodel) = cursor {
            if let Some(slot) = viewmodel.slot(name) {
                return Ok(slot);
            }
            cursor = viewmodel.parent();
        }
        Err(BindError::PropertyNotFound(name.to_string()))
    }

    /// The nearest viewmodel above this one's view.
    pub fn parent(&self) -> Option<ViewModel> {
        Hierarchy::parent_of(self)
    }

    /// The nearest viewmodels below this one's view.
    pub fn children(&self) -> Vec<ViewModel> {
        Hierarchy::children_of(self)
    }

    /// Current values of all plain properties.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.inner
            .slots
            .read()
            .iter()
            .filter_map(|(name, slot)| match slot {
                Slot::Value(property) => Some((name.clone(), property.get_untracked())),
                Slot::Computed(_) => None,
            })
            .collect()
    }

    /// Apply saved values to the plain properties that still exist.
    ///
    /// All writes land in one batch. Returns the names that were skipped.
    pub fn restore(&self, values: &IndexMap<String, Value>) -> Vec<String> {
        Runtime::batch(|| {
            let mut skipped = Vec::new();
            for (name, value) in values {
                match self.slot(name) {
                    Some(Slot::Value(property)) => {
                        property.set(value.clone());
                    }
                    _ => skipped.push(name.clone()),
                }
            }
            skipped
        })
    }

    /// Dispose autoruns and computeds. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let autoruns = std::mem::take(&mut *self.inner.autoruns.lock());
        for autorun in autoruns {
            autorun.dispose();
        }
        for slot in self.inner.slots.read().values() {
            if let Slot::Computed(computed) = slot {
                computed.dispose();
            }
        }

        tracing::debug!(viewmodel = ?self.inner.id, "viewmodel disposed");
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of live autoruns owned by this viewmodel.
    pub fn autorun_count(&self) -> usize {
        self.inner
            .autoruns
            .lock()
            .iter()
            .filter(|autorun| !autorun.is_disposed())
            .count()
    }
}

impl std::fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewModel")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("properties", &self.property_names())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn add_props_then_get() {
        let vm = ViewModel::new(None);
        vm.add_props(&Definition::new().prop("p", json!(1))).unwrap();
        assert_eq!(vm.get("p").unwrap(), json!(1));
    }

    #[test]
    fn add_props_is_additive() {
        let vm = ViewModel::new(None);
        vm.add_props(&Definition::new().prop("p", json!(1))).unwrap();
        vm.set("p", json!(2)).unwrap();

        vm.add_props(&Definition::new().prop("q", json!("y")).prop("p", json!(99)))
            .unwrap();

        assert_eq!(vm.get("p").unwrap(), json!(2));
        assert_eq!(vm.get("q").unwrap(), json!("y"));
        assert_eq!(vm.property_names(), vec!["p", "q"]);
    }

    #[test]
    fn redefining_a_computed_replaces_it() {
        let vm = ViewModel::new(None);
        vm.add_props(&Definition::new().computed("c", |_| json!(1))).unwrap();
        assert_eq!(vm.get("c").unwrap(), json!(1));

        vm.add_props(&Definition::new().computed("c", |_| json!(2))).unwrap();
        assert_eq!(vm.get("c").unwrap(), json!(2));
    }

    #[test]
    fn computed_reads_sibling_properties() {
        let vm = ViewModel::new(None);
        vm.add_props(
            &Definition::new()
                .prop("first", json!("Ada"))
                .computed("greeting", |vm| {
                    let first = vm.get("first").unwrap_or_default();
                    json!(format!("hi {}", first.as_str().unwrap_or("")))
                }),
        )
        .unwrap();

        assert_eq!(vm.get("greeting").unwrap(), json!("hi Ada"));
        vm.set("first", json!("Grace")).unwrap();
        assert_eq!(vm.get("greeting").unwrap(), json!("hi Grace"));
    }

    #[test]
    fn computed_is_read_only() {
        let vm = ViewModel::new(None);
        vm.add_props(&Definition::new().computed("c", |_| json!(1))).unwrap();
        assert_eq!(vm.set("c", json!(2)), Err(BindError::ReadOnly("c".into())));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let vm = ViewModel::new(None);
        let err = vm.add_props(&Definition::new().prop("created", json!(1))).unwrap_err();
        assert_eq!(err, BindError::ReservedName("created".into()));
    }

    #[test]
    fn unknown_property_is_an_error() {
        let vm = ViewModel::new(None);
        assert_eq!(vm.get("nope"), Err(BindError::PropertyNotFound("nope".into())));
    }

    #[test]
    fn autoruns_stop_on_dispose() {
        let vm = ViewModel::new(None);
        vm.add_props(&Definition::new().prop("p", json!(0))).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        vm.autorun(move |vm| {
            vm.get("p").ok();
            counter.fetch_add(1, Ordering::SeqCst);
        });

        vm.set("p", json!(1)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert!(vm.dispose());
        assert!(!vm.dispose());
        vm.set("p", json!(2)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(vm.autorun_count(), 0);
    }

    #[test]
    fn snapshot_and_restore_skip_unknown_names() {
        let vm = ViewModel::new(None);
        vm.add_props(
            &Definition::new()
                .prop("kept", json!(1))
                .computed("derived", |_| json!(0)),
        )
        .unwrap();
        vm.set("kept", json!(5)).unwrap();

        let snapshot = vm.snapshot();
        assert_eq!(snapshot.len(), 1);

        let fresh = ViewModel::new(None);
        fresh.add_props(&Definition::new().prop("kept", json!(1))).unwrap();

        let mut saved = snapshot.clone();
        saved.insert("gone".into(), json!(true));
        let skipped = fresh.restore(&saved);

        assert_eq!(skipped, vec!["gone"]);
        assert_eq!(fresh.get("kept").unwrap(), json!(5));
    }

    #[test]
    fn global_viewmodel_is_a_singleton() {
        let a = ViewModel::global();
        let b = ViewModel::global();
        assert_eq!(a.id(), b.id());
        assert!(a.is_global());
        assert_eq!(a.name(), Some(GLOBAL_NAME));
    }
}
