//! Document Nodes
//!
//! This module defines the node records stored in a [`Document`](super::Document).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::event::Event;

/// Unique identifier for a node in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for removing an event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An event listener callback.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// A one-shot callback fired when a node leaves the document.
pub type RemovalHook = Box<dyn FnOnce() + Send + Sync>;

pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) kind: String,
    pub(crate) handler: EventHandler,
}

/// A node in the document tree.
pub(crate) struct NodeData {
    pub(crate) tag: String,
    /// String attributes (`id`, `class`, `data-*`).
    pub(crate) attrs: IndexMap<String, String>,
    /// Live element state (`value`, `checked`, ...).
    pub(crate) props: IndexMap<String, Value>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) removal_hooks: Vec<RemovalHook>,
    pub(crate) attached: bool,
}

impl NodeData {
    pub(crate) fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            props: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
            removal_hooks: Vec::new(),
            attached: false,
        }
    }

    /// Whether the node matches a simple selector: `tag`, `.class`, `#id`,
    /// or `tag.class`.
    pub(crate) fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector.is_empty() {
            return true;
        }
        if let Some(id) = selector.strip_prefix('#') {
            return self.attrs.get("id").map(String::as_str) == Some(id);
        }

        let (tag, class) = match selector.split_once('.') {
            Some((tag, class)) => (tag, Some(class)),
            None => (selector, None),
        };
        if !tag.is_empty() && !tag.eq_ignore_ascii_case(&self.tag) {
            return false;
        }
        match class {
            Some(class) => self
                .attrs
                .get("class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)),
            None => true,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
