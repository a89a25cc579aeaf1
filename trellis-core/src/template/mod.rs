//! Templates and the Headless Host
//!
//! This module is the host framework the engine plugs into: template
//! definitions with lifecycle hooks, event maps and helpers; the views they
//! render into; and a [`Renderer`] that drives instantiation, rendering and
//! destruction against a [`Document`](crate::dom::Document).
//!
//! The engine only relies on the host contract:
//!
//! - `created`, `rendered` and `destroyed` hooks per template
//! - event maps (`"change input.name"`) attached to a view's elements
//! - named helpers, of which the engine registers one: the bind helper
//! - startup hooks fired after every full (re-)render of the body

mod view;
mod renderer;

pub use view::{View, ViewId, WeakView};
pub use renderer::{RenderScope, Renderer, StartupHook, BIND_ATTR};

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::dom::Event;
use crate::error::Result;

/// A lifecycle hook. Errors abort the render and propagate to the caller.
pub type Hook = Arc<dyn Fn(&View) -> Result<()> + Send + Sync>;

/// A template event-map handler.
pub type TemplateEventHandler = Arc<dyn Fn(&Event, &View) + Send + Sync>;

/// A template helper.
pub type Helper = Arc<dyn Fn(&View, &[Value]) -> Value + Send + Sync>;

/// Builds a view's elements.
pub type RenderFn = Arc<dyn Fn(&mut RenderScope<'_>) -> Result<()> + Send + Sync>;

/// The bind helper: passes the declaration string through to the element.
pub fn bind_helper() -> Helper {
    Arc::new(|_view, args| {
        let declarations: Vec<&str> = args.iter().filter_map(Value::as_str).collect();
        Value::String(declarations.join(", "))
    })
}

/// A template definition.
///
/// Set up once (hooks, helpers, events, render function) and then shared
/// behind an `Arc` by every view rendered from it.
pub struct Template {
    name: String,
    created: Vec<Hook>,
    rendered: Vec<Hook>,
    destroyed: Vec<Hook>,
    events: Vec<(String, TemplateEventHandler)>,
    helpers: IndexMap<String, Helper>,
    render: Option<RenderFn>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: Vec::new(),
            rendered: Vec::new(),
            destroyed: Vec::new(),
            events: Vec::new(),
            helpers: IndexMap::new(),
            render: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a hook run when a view is instantiated, before rendering.
    pub fn on_created<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&View) -> Result<()> + Send + Sync + 'static,
    {
        self.created.push(Arc::new(hook));
        self
    }

    /// Register a hook run once the view's elements and bindings exist.
    pub fn on_rendered<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&View) -> Result<()> + Send + Sync + 'static,
    {
        self.rendered.push(Arc::new(hook));
        self
    }

    /// Register a hook run when a view is destroyed.
    pub fn on_destroyed<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&View) -> Result<()> + Send + Sync + 'static,
    {
        self.destroyed.push(Arc::new(hook));
        self
    }

    /// Add one event-map entry. `key` is `"<event> [selector]"`; without a
    /// selector the handler is attached to the view's root elements.
    pub fn event<F>(&mut self, key: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Event, &View) + Send + Sync + 'static,
    {
        self.events.push((key.into(), Arc::new(handler)));
        self
    }

    /// Register a helper under `name`, replacing any previous one.
    pub fn helper(&mut self, name: impl Into<String>, helper: Helper) -> &mut Self {
        self.helpers.insert(name.into(), helper);
        self
    }

    /// Set the render function.
    pub fn render<F>(&mut self, render: F) -> &mut Self
    where
        F: Fn(&mut RenderScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn get_helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub(crate) fn created_hooks(&self) -> &[Hook] {
        &self.created
    }

    pub(crate) fn rendered_hooks(&self) -> &[Hook] {
        &self.rendered
    }

    pub(crate) fn destroyed_hooks(&self) -> &[Hook] {
        &self.destroyed
    }

    pub(crate) fn event_map(&self) -> &[(String, TemplateEventHandler)] {
        &self.events
    }

    pub(crate) fn render_fn(&self) -> Option<&RenderFn> {
        self.render.as_ref()
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("events", &self.events.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
