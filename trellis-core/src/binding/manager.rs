//! Binding Instance Manager
//!
//! Turns a declaration string on an element into live binding instances and
//! tears them down again.
//!
//! # How Binding Works
//!
//! 1. Parse the declaration string into declarations.
//! 2. Resolve every declaration: binding type, property path, realized
//!    set/on/get. Any failure aborts before anything is wired.
//! 3. Wire each declaration in order:
//!    - an autorun that calls `set(element, value)` now and on every change
//!    - one listener per `on` event that calls `get(event, element, setter)`
//! 4. Register a removal hook on the element that tears its instances down.
//!
//! Teardown disposes the autorun, removes the listeners and deactivates the
//! setter, so a late throttled write becomes a no-op. It is idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::dom::{Element, ListenerId, NodeId};
use crate::error::{BindError, Result};
use crate::reactive::Autorun;
use crate::template::View;
use crate::viewmodel::{Hierarchy, Slot, ViewModel};

use super::definition::{Binding, BindingContext, Setter};
use super::parse::{parse, Declaration};
use super::registry::BindingRegistry;

/// One wired declaration.
pub struct BindingInstance {
    kind: String,
    path: String,
    element: Element,
    viewmodel: ViewModel,
    autorun: Option<Autorun>,
    listeners: Mutex<Vec<ListenerId>>,
    active: Arc<AtomicBool>,
}

impl BindingInstance {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// The viewmodel the path resolved to.
    pub fn viewmodel(&self) -> &ViewModel {
        &self.viewmodel
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Dispose the autorun and remove the listeners. Returns `false` if the
    /// instance was already torn down.
    pub fn teardown(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(autorun) = &self.autorun {
            autorun.dispose();
        }
        for id in self.listeners.lock().drain(..) {
            self.element.remove_listener(id);
        }
        tracing::debug!(kind = %self.kind, path = %self.path, "binding torn down");
        true
    }
}

impl std::fmt::Debug for BindingInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingInstance")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("element", &self.element.id())
            .field("active", &self.is_active())
            .finish()
    }
}

type InstanceMap = IndexMap<NodeId, Vec<Arc<BindingInstance>>>;

struct Resolved {
    declaration: Declaration,
    viewmodel: ViewModel,
    property: String,
    slot: Slot,
    binding: Binding,
}

/// Creates and tracks binding instances.
#[derive(Clone)]
pub struct BindingManager {
    registry: Arc<BindingRegistry>,
    instances: Arc<Mutex<InstanceMap>>,
}

impl BindingManager {
    pub fn new(registry: Arc<BindingRegistry>) -> Self {
        Self {
            registry,
            instances: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    /// Bind `element` according to `input`, resolving paths from `view`.
    pub fn bind(&self, view: &View, element: &Element, input: &str) -> Result<Vec<Arc<BindingInstance>>> {
        let declarations = parse(input, |name| self.registry.contains(name))?;

        let resolved = declarations
            .into_iter()
            .map(|declaration| self.resolve(view, declaration))
            .collect::<Result<Vec<_>>>()?;

        let wired: Vec<Arc<BindingInstance>> = resolved
            .into_iter()
            .map(|resolved| Arc::new(wire(element, resolved)))
            .collect();

        self.instances
            .lock()
            .entry(element.id())
            .or_default()
            .extend(wired.iter().cloned());

        let instances: Weak<Mutex<InstanceMap>> = Arc::downgrade(&self.instances);
        let id = element.id();
        element.on_removed(move || {
            if let Some(instances) = instances.upgrade() {
                let removed = instances.lock().shift_remove(&id);
                teardown_all(removed);
            }
        });

        Ok(wired)
    }

    fn resolve(&self, view: &View, declaration: Declaration) -> Result<Resolved> {
        let definition = self.registry.resolve(&declaration.kind)?;
        let (viewmodel, property) = Hierarchy::resolve_property(view, &declaration.path)?;
        let slot = viewmodel
            .slot(&property)
            .ok_or_else(|| BindError::PropertyNotFound(declaration.path.clone()))?;

        let context = BindingContext {
            property: &slot,
            path: &declaration.path,
            args: &declaration.args,
            kwargs: &declaration.kwargs,
        };
        let binding = definition.realize(&declaration.kind, &context)?;

        Ok(Resolved {
            declaration,
            viewmodel,
            property,
            slot,
            binding,
        })
    }

    /// Tear down every instance on `element`. Returns how many were live.
    pub fn unbind_element(&self, element: &Element) -> usize {
        let removed = self.instances.lock().shift_remove(&element.id());
        teardown_all(removed)
    }

    /// Tear down every instance on elements created by `view`.
    pub fn unbind_view(&self, view: &View) -> usize {
        view.elements()
            .iter()
            .map(|element| self.unbind_element(element))
            .sum()
    }

    pub fn instances_for(&self, element: &Element) -> Vec<Arc<BindingInstance>> {
        self.instances
            .lock()
            .get(&element.id())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of live instances.
    pub fn active_count(&self) -> usize {
        self.instances
            .lock()
            .values()
            .flatten()
            .filter(|instance| instance.is_active())
            .count()
    }
}

impl std::fmt::Debug for BindingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingManager")
            .field("elements", &self.instances.lock().len())
            .finish()
    }
}

fn wire(element: &Element, resolved: Resolved) -> BindingInstance {
    let Resolved {
        declaration,
        viewmodel,
        property,
        slot,
        binding,
    } = resolved;
    let active = Arc::new(AtomicBool::new(true));

    // Looked up on every run so a redefined computed replaces the old one.
    let autorun = binding.set_fn().map(|set| {
        let set = Arc::clone(set);
        let element = element.clone();
        let viewmodel = viewmodel.clone();
        let resolved = slot.clone();
        Autorun::new(move || {
            let value = viewmodel
                .slot_tracked(&property)
                .unwrap_or_else(|| resolved.clone())
                .get();
            set(&element, &value);
        })
    });

    let mut listeners = Vec::new();
    if let Some(get) = binding.get_fn() {
        for kind in binding.events() {
            let get = Arc::clone(get);
            let setter = Setter::new(slot.clone(), &declaration.path, Arc::clone(&active));
            listeners.push(element.add_listener(kind, move |event| {
                if setter.is_active() {
                    get(event, event.current_target(), &setter);
                }
            }));
        }
    }

    tracing::debug!(
        kind = %declaration.kind,
        path = %declaration.path,
        element = element.id().raw(),
        listeners = listeners.len(),
        "binding wired"
    );

    BindingInstance {
        kind: declaration.kind,
        path: declaration.path,
        element: element.clone(),
        viewmodel,
        autorun,
        listeners: Mutex::new(listeners),
        active,
    }
}

fn teardown_all(instances: Option<Vec<Arc<BindingInstance>>>) -> usize {
    instances
        .into_iter()
        .flatten()
        .filter(|instance| instance.teardown())
        .count()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingDefinition;
    use crate::dom::Document;
    use crate::template::Template;
    use crate::viewmodel::Definition;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        document: Document,
        view: View,
        viewmodel: ViewModel,
        manager: BindingManager,
    }

    fn fixture(definition: Definition) -> Fixture {
        let document = Document::new();
        let view = View::new(Arc::new(Template::new("body")), None, false, IndexMap::new());
        let viewmodel = view.viewmodel_or_create();
        viewmodel.add_props(&definition).unwrap();
        Fixture {
            document,
            view,
            viewmodel,
            manager: BindingManager::new(Arc::new(BindingRegistry::with_builtins())),
        }
    }

    fn input(fixture: &Fixture) -> Element {
        let element = fixture.document.create_element("input");
        fixture.document.body().append(&element);
        fixture.view.add_owned(element.clone());
        element
    }

    #[test]
    fn redefined_computed_reaches_existing_bindings() {
        let f = fixture(
            Definition::new()
                .prop("name", json!("ada"))
                .computed("label", |vm| vm.get("name").unwrap_or_default()),
        );
        let element = input(&f);
        f.manager.bind(&f.view, &element, "value: label").unwrap();
        assert_eq!(element.val(), json!("ada"));

        f.viewmodel
            .add_props(&Definition::new().computed("label", |vm| {
                let name = vm.get("name").unwrap_or_default();
                json!(format!("<{}>", name.as_str().unwrap_or_default()))
            }))
            .unwrap();
        assert_eq!(element.val(), json!("<ada>"));

        f.viewmodel.set("name", json!("grace")).unwrap();
        assert_eq!(element.val(), json!("<grace>"));
    }

    #[test]
    fn checked_syncs_both_ways() {
        let f = fixture(Definition::new().prop("done", json!(false)));
        let element = input(&f);
        f.manager.bind(&f.view, &element, "checked: done").unwrap();

        assert!(!element.checked());
        f.viewmodel.set("done", json!(true)).unwrap();
        assert!(element.checked());

        element.set_checked(false);
        element.fire("change");
        assert_eq!(f.viewmodel.get("done").unwrap(), json!(false));
    }

    #[test]
    fn unresolvable_declarations_wire_nothing() {
        let f = fixture(Definition::new().prop("done", json!(false)));
        let element = input(&f);

        let err = f
            .manager
            .bind(&f.view, &element, "checked: done, value: missing")
            .unwrap_err();
        assert_eq!(err, BindError::PropertyNotFound("missing".into()));
        assert_eq!(element.listener_count(), 0);
        assert_eq!(f.manager.active_count(), 0);
    }

    #[test]
    fn unknown_binding_type() {
        let f = fixture(Definition::new().prop("x", json!(1)));
        let element = input(&f);
        assert_eq!(
            f.manager.bind(&f.view, &element, "text: x").unwrap_err(),
            BindError::UnknownBinding("text".into())
        );
    }

    #[test]
    fn removal_tears_down_once() {
        let f = fixture(Definition::new().prop("name", json!("a")));
        let element = input(&f);
        let instances = f.manager.bind(&f.view, &element, "value: name").unwrap();
        assert_eq!(element.listener_count(), 5);

        element.remove();
        assert_eq!(element.listener_count(), 0);
        assert!(!instances[0].is_active());
        assert!(!instances[0].teardown());
        assert_eq!(f.manager.unbind_element(&element), 0);

        f.viewmodel.set("name", json!("b")).unwrap();
        assert!(element.document().element(element.id()).is_none());
        assert_eq!(element.val(), Value::Null);
    }

    #[test]
    fn one_way_binding_has_no_listeners() {
        let f = fixture(Definition::new().prop("title", json!("hello")));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        f.manager
            .registry()
            .add_binding(
                "title",
                BindingDefinition::from(Binding::new().set(move |element, value: &Value| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    element.set_attr("title", value.as_str().unwrap_or_default());
                })),
            )
            .unwrap();

        let element = input(&f);
        let instances = f.manager.bind(&f.view, &element, "title: title").unwrap();
        assert_eq!(instances[0].listener_count(), 0);
        assert_eq!(element.attr("title").as_deref(), Some("hello"));

        f.viewmodel.set("title", json!("bye")).unwrap();
        assert_eq!(element.attr("title").as_deref(), Some("bye"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn multiple_declarations_set_in_order() {
        let f = fixture(
            Definition::new()
                .prop("done", json!(true))
                .prop("label", json!("x")),
        );
        let element = input(&f);
        let instances = f
            .manager
            .bind(&f.view, &element, "checked: done, value: label")
            .unwrap();

        let kinds: Vec<&str> = instances.iter().map(|i| i.kind()).collect();
        assert_eq!(kinds, vec!["checked", "value"]);
        assert!(element.checked());
        assert_eq!(element.val(), json!("x"));
        assert_eq!(f.manager.unbind_view(&f.view), 2);
    }
}
