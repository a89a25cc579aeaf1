//! Document and Element handles.
//!
//! The document is an arena of nodes behind one lock. [`Element`] is a
//! cheap handle (document + node ID) that reads and writes through it.
//!
//! Callbacks (listeners, removal hooks) are always collected under the lock
//! and invoked after it is released, so a callback may freely touch the
//! document again.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::event::Event;
use super::node::{EventHandler, Listener, ListenerId, NodeData, NodeId, RemovalHook};

/// An in-memory document.
#[derive(Clone)]
pub struct Document {
    inner: Arc<RwLock<DocumentInner>>,
}

struct DocumentInner {
    nodes: HashMap<NodeId, NodeData>,
    body: NodeId,
}

impl Document {
    /// Create a document containing an attached `body` element.
    pub fn new() -> Self {
        let body = NodeId::new();
        let mut data = NodeData::new("body");
        data.attached = true;

        let mut nodes = HashMap::new();
        nodes.insert(body, data);

        Self {
            inner: Arc::new(RwLock::new(DocumentInner { nodes, body })),
        }
    }

    /// The `body` element.
    pub fn body(&self) -> Element {
        let body = self.inner.read().body;
        self.handle(body)
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> Element {
        let id = NodeId::new();
        self.inner.write().nodes.insert(id, NodeData::new(tag));
        self.handle(id)
    }

    /// Get a handle to an existing node.
    pub fn element(&self, id: NodeId) -> Option<Element> {
        self.inner
            .read()
            .nodes
            .contains_key(&id)
            .then(|| self.handle(id))
    }

    /// Fire an event at `target` and let it bubble to the root.
    ///
    /// Returns the number of listeners invoked. Listeners are snapshotted
    /// before the first one runs.
    pub fn dispatch(&self, target: &Element, kind: &str) -> usize {
        let calls: Vec<(NodeId, EventHandler)> = {
            let inner = self.inner.read();
            let mut calls = Vec::new();
            let mut cursor = Some(target.id);
            while let Some(id) = cursor {
                let Some(node) = inner.nodes.get(&id) else { break };
                calls.extend(
                    node.listeners
                        .iter()
                        .filter(|listener| listener.kind == kind)
                        .map(|listener| (id, Arc::clone(&listener.handler))),
                );
                cursor = node.parent;
            }
            calls
        };

        tracing::trace!(kind, target = target.id.raw(), listeners = calls.len(), "dispatching event");

        for (current, handler) in &calls {
            let event = Event::new(kind, target.clone(), self.handle(*current));
            handler(&event);
        }
        calls.len()
    }

    /// Remove `element` and its subtree from the document and free their
    /// nodes.
    ///
    /// Removal hooks of every node in the subtree fire once, after the tree
    /// has been updated. Handles to removed nodes stay valid but read as
    /// empty. Removing an already-removed element does nothing.
    pub fn remove(&self, element: &Element) {
        let hooks: Vec<RemovalHook> = {
            let mut inner = self.inner.write();
            if element.id == inner.body {
                return;
            }

            if let Some(parent) = inner.nodes.get(&element.id).and_then(|node| node.parent) {
                if let Some(parent) = inner.nodes.get_mut(&parent) {
                    parent.children.retain(|child| *child != element.id);
                }
            }

            let mut hooks = Vec::new();
            for id in inner.subtree(element.id) {
                if let Some(mut node) = inner.nodes.remove(&id) {
                    hooks.append(&mut node.removal_hooks);
                }
            }
            hooks
        };

        for hook in hooks {
            hook();
        }
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Total number of listeners attached anywhere in the document.
    pub fn listener_count(&self) -> usize {
        self.inner
            .read()
            .nodes
            .values()
            .map(|node| node.listeners.len())
            .sum()
    }

    fn handle(&self, id: NodeId) -> Element {
        Element {
            document: self.clone(),
            id,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("node_count", &self.node_count())
            .finish()
    }
}

impl DocumentInner {
    /// The node and all of its descendants, parents first.
    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

/// A handle to one element of a [`Document`].
#[derive(Clone)]
pub struct Element {
    document: Document,
    id: NodeId,
}

impl Element {
    /// The node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The owning document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The tag name.
    pub fn tag(&self) -> String {
        self.read(|node| node.tag.clone()).unwrap_or_default()
    }

    /// Get a string attribute.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.read(|node| node.attrs.get(name).cloned()).flatten()
    }

    /// Set a string attribute.
    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.write(|node| {
            node.attrs.insert(name.to_string(), value);
        });
    }

    /// Get a live property, `null` when unset.
    ///
    /// Like a real DOM, writing a property never fires an event.
    pub fn prop(&self, name: &str) -> Value {
        self.read(|node| node.props.get(name).cloned())
            .flatten()
            .unwrap_or(Value::Null)
    }

    /// Set a live property.
    pub fn set_prop(&self, name: &str, value: Value) {
        self.write(|node| {
            node.props.insert(name.to_string(), value);
        });
    }

    /// The `value` property.
    pub fn val(&self) -> Value {
        self.prop("value")
    }

    /// Set the `value` property.
    pub fn set_val(&self, value: Value) {
        self.set_prop("value", value);
    }

    /// The `checked` property as a boolean.
    pub fn checked(&self) -> bool {
        self.prop("checked").as_bool().unwrap_or(false)
    }

    /// Set the `checked` property.
    pub fn set_checked(&self, checked: bool) {
        self.set_prop("checked", Value::Bool(checked));
    }

    /// Append `child` as the last child, detaching it from any old parent.
    pub fn append(&self, child: &Element) {
        let mut inner = self.document.inner.write();
        if !inner.nodes.contains_key(&self.id) || !inner.nodes.contains_key(&child.id) {
            return;
        }

        if let Some(old_parent) = inner.nodes.get(&child.id).and_then(|node| node.parent) {
            if let Some(old_parent) = inner.nodes.get_mut(&old_parent) {
                old_parent.children.retain(|id| *id != child.id);
            }
        }

        let attached = inner.nodes.get(&self.id).is_some_and(|node| node.attached);
        if let Some(parent) = inner.nodes.get_mut(&self.id) {
            parent.children.push(child.id);
        }
        if let Some(node) = inner.nodes.get_mut(&child.id) {
            node.parent = Some(self.id);
        }
        for id in inner.subtree(child.id) {
            if let Some(node) = inner.nodes.get_mut(&id) {
                node.attached = attached;
            }
        }
    }

    /// The parent element, if any.
    pub fn parent(&self) -> Option<Element> {
        self.read(|node| node.parent)
            .flatten()
            .map(|id| self.document.handle(id))
    }

    /// The child elements, in order.
    pub fn children(&self) -> Vec<Element> {
        self.read(|node| node.children.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|id| self.document.handle(id))
            .collect()
    }

    /// This element followed by all of its descendants, in document order.
    pub fn subtree(&self) -> Vec<Element> {
        let ids = self.document.inner.read().subtree(self.id);
        ids.into_iter().map(|id| self.document.handle(id)).collect()
    }

    /// Whether the element is connected to the document body.
    pub fn is_attached(&self) -> bool {
        self.read(|node| node.attached).unwrap_or(false)
    }

    /// Whether the element matches a simple selector.
    pub fn matches(&self, selector: &str) -> bool {
        self.read(|node| node.matches(selector)).unwrap_or(false)
    }

    /// Attach an event listener.
    pub fn add_listener<F>(&self, kind: &str, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        let listener = Listener {
            id,
            kind: kind.to_string(),
            handler: Arc::new(handler),
        };
        self.write(|node| node.listeners.push(listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not attached.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.write(|node| {
            let before = node.listeners.len();
            node.listeners.retain(|listener| listener.id != id);
            node.listeners.len() != before
        })
        .unwrap_or(false)
    }

    /// Number of listeners attached to this element.
    pub fn listener_count(&self) -> usize {
        self.read(|node| node.listeners.len()).unwrap_or(0)
    }

    /// Run `hook` once when this element (or an ancestor) is removed.
    pub fn on_removed<F>(&self, hook: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.write(|node| node.removal_hooks.push(Box::new(hook)));
    }

    /// Fire an event at this element.
    pub fn fire(&self, kind: &str) -> usize {
        self.document.dispatch(self, kind)
    }

    /// Remove this element from the document.
    pub fn remove(&self) {
        self.document.remove(self);
    }

    fn read<R>(&self, f: impl FnOnce(&NodeData) -> R) -> Option<R> {
        self.document.inner.read().nodes.get(&self.id).map(f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        self.document.inner.write().nodes.get_mut(&self.id).map(f)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.document.inner, &other.document.inner)
    }
}

impl Eq for Element {}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id.raw())
            .field("tag", &self.tag())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn append_attaches_subtree() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let input = doc.create_element("input");
        div.append(&input);
        assert!(!input.is_attached());

        doc.body().append(&div);
        assert!(div.is_attached());
        assert!(input.is_attached());
        assert_eq!(input.parent(), Some(div.clone()));
        assert_eq!(div.subtree(), vec![div.clone(), input]);
    }

    #[test]
    fn props_do_not_fire_events() {
        let doc = Document::new();
        let input = doc.create_element("input");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        input.add_listener("change", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        input.set_val(json!("hello"));
        assert_eq!(input.val(), json!("hello"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert_eq!(input.fire("change"), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let doc = Document::new();
        let form = doc.create_element("form");
        let input = doc.create_element("input");
        form.append(&input);
        doc.body().append(&form);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        form.add_listener("input", move |event| {
            log.lock().push((event.target().tag(), event.current_target().tag()));
        });

        input.fire("input");
        assert_eq!(*seen.lock(), vec![("input".to_string(), "form".to_string())]);
    }

    #[test]
    fn remove_listener_is_idempotent() {
        let doc = Document::new();
        let input = doc.create_element("input");
        let id = input.add_listener("change", |_| {});

        assert_eq!(input.listener_count(), 1);
        assert!(input.remove_listener(id));
        assert!(!input.remove_listener(id));
        assert_eq!(doc.listener_count(), 0);
    }

    #[test]
    fn removal_hooks_fire_once_for_the_subtree() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let input = doc.create_element("input");
        div.append(&input);
        doc.body().append(&div);

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        input.on_removed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        div.remove();
        div.remove();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!input.is_attached());
        assert!(doc.body().children().is_empty());
    }

    #[test]
    fn remove_frees_the_subtree() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let input = doc.create_element("input");
        div.append(&input);
        doc.body().append(&div);
        input.set_val(json!("draft"));
        assert_eq!(doc.node_count(), 3);

        div.remove();
        assert_eq!(doc.node_count(), 1);
        assert!(doc.element(input.id()).is_none());
        assert_eq!(input.val(), Value::Null);
        assert!(input.parent().is_none());
    }
}
