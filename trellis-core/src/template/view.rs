//! Views
//!
//! A view is one rendered instance of a template: the "template node" that
//! owns a viewmodel. Views form a tree mirroring template nesting. Parents
//! own their children; children hold weak back-references.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::dom::{Element, ListenerId};
use crate::viewmodel::ViewModel;

use super::Template;

/// Unique identifier for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

impl ViewId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A rendered template instance.
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

/// A non-owning reference to a view.
#[derive(Clone)]
pub struct WeakView(Weak<ViewInner>);

impl WeakView {
    pub fn upgrade(&self) -> Option<View> {
        self.0.upgrade().map(|inner| View { inner })
    }
}

struct ViewInner {
    id: ViewId,
    template: Arc<Template>,
    parent: Option<WeakView>,
    /// Position of this view in the tree, e.g. `body/list#0/item#2`.
    path: String,
    /// Binds through the global viewmodel when nothing closer exists.
    global: bool,
    children: Mutex<Vec<View>>,
    /// Elements appended directly to the view's container.
    roots: Mutex<Vec<Element>>,
    /// Every element created by this view, in creation order.
    owned: Mutex<Vec<Element>>,
    /// Template event-map listeners attached at render.
    listeners: Mutex<Vec<(Element, ListenerId)>>,
    viewmodel: RwLock<Option<ViewModel>>,
    /// Property values recovered from a restore snapshot.
    seed: Mutex<IndexMap<String, Value>>,
    rendered: AtomicBool,
    destroyed: AtomicBool,
}

impl View {
    /// Create a view and link it under `parent`.
    pub(crate) fn new(
        template: Arc<Template>,
        parent: Option<&View>,
        global: bool,
        seed: IndexMap<String, Value>,
    ) -> Self {
        let path = Self::path_for(parent, template.name());

        let view = View {
            inner: Arc::new(ViewInner {
                id: ViewId::new(),
                template,
                parent: parent.map(View::downgrade),
                path,
                global,
                children: Mutex::new(Vec::new()),
                roots: Mutex::new(Vec::new()),
                owned: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                viewmodel: RwLock::new(None),
                seed: Mutex::new(seed),
                rendered: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        };

        if let Some(parent) = parent {
            parent.inner.children.lock().push(view.clone());
        }
        view
    }

    /// The path a view of template `name` would get if created under
    /// `parent` now.
    pub(crate) fn path_for(parent: Option<&View>, name: &str) -> String {
        match parent {
            Some(parent) => {
                let index = parent
                    .children()
                    .iter()
                    .filter(|sibling| sibling.name() == name)
                    .count();
                format!("{}/{}#{}", parent.path(), name, index)
            }
            None => name.to_string(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.inner.id
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.inner.template
    }

    /// The template's name.
    pub fn name(&self) -> &str {
        self.inner.template.name()
    }

    /// The view's position key in the tree.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn parent(&self) -> Option<View> {
        self.inner.parent.as_ref().and_then(WeakView::upgrade)
    }

    /// This view followed by its ancestors, nearest first.
    pub fn lineage(&self) -> Vec<View> {
        let mut out = vec![self.clone()];
        let mut cursor = self.parent();
        while let Some(view) = cursor {
            cursor = view.parent();
            out.push(view);
        }
        out
    }

    pub fn children(&self) -> Vec<View> {
        self.inner.children.lock().clone()
    }

    /// This view and all of its descendants, parents first.
    pub fn walk(&self) -> Vec<View> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(view) = stack.pop() {
            stack.extend(view.children().into_iter().rev());
            out.push(view);
        }
        out
    }

    /// Elements appended directly to the view's container.
    pub fn roots(&self) -> Vec<Element> {
        self.inner.roots.lock().clone()
    }

    /// Every element the view created, in creation order.
    pub fn elements(&self) -> Vec<Element> {
        self.inner.owned.lock().clone()
    }

    /// The viewmodel attached directly to this view.
    pub fn viewmodel(&self) -> Option<ViewModel> {
        self.inner.viewmodel.read().clone()
    }

    /// The view's viewmodel, creating an unnamed one if it has none.
    pub fn viewmodel_or_create(&self) -> ViewModel {
        if let Some(viewmodel) = self.viewmodel() {
            return viewmodel;
        }
        let viewmodel = ViewModel::for_view(self, None);
        self.set_viewmodel(viewmodel.clone());
        viewmodel
    }

    /// Attach a viewmodel. A view holds at most one; a second call replaces
    /// the first only if the first is disposed.
    pub fn set_viewmodel(&self, viewmodel: ViewModel) -> bool {
        let mut slot = self.inner.viewmodel.write();
        if slot.as_ref().is_some_and(|existing| !existing.is_disposed()) {
            return false;
        }
        *slot = Some(viewmodel);
        true
    }

    /// Whether unresolved lookups from this view fall back to the global
    /// viewmodel.
    pub fn uses_global(&self) -> bool {
        self.inner.global
    }

    pub fn is_rendered(&self) -> bool {
        self.inner.rendered.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub fn downgrade(&self) -> WeakView {
        WeakView(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Take the restored value for `name`, if the view was seeded with one.
    pub(crate) fn take_seed(&self, name: &str) -> Option<Value> {
        self.inner.seed.lock().shift_remove(name)
    }

    pub(crate) fn add_root(&self, element: Element) {
        self.inner.roots.lock().push(element);
    }

    pub(crate) fn add_owned(&self, element: Element) {
        self.inner.owned.lock().push(element);
    }

    pub(crate) fn add_listener(&self, element: Element, id: ListenerId) {
        self.inner.listeners.lock().push((element, id));
    }

    pub(crate) fn take_listeners(&self) -> Vec<(Element, ListenerId)> {
        std::mem::take(&mut *self.inner.listeners.lock())
    }

    pub(crate) fn remove_child(&self, child: &View) {
        self.inner.children.lock().retain(|view| !view.ptr_eq(child));
    }

    pub(crate) fn mark_rendered(&self) {
        self.inner.rendered.store(true, Ordering::SeqCst);
    }

    /// Returns `true` the first time only.
    pub(crate) fn mark_destroyed(&self) -> bool {
        !self.inner.destroyed.swap(true, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
