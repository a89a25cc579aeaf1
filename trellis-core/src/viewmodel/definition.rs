//! Viewmodel Definitions
//!
//! A [`Definition`] is what a template author declares for a template:
//! initial property values, computeds, autoruns, lifecycle callbacks and
//! event handlers. It is inert until [`declare`](crate::lifecycle::declare)
//! attaches it to a template.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::dom::Event;
use crate::error::{BindError, Result};

use super::ViewModel;

/// Names that map to lifecycle hooks or event maps and cannot be used as
/// property names.
pub const RESERVED_NAMES: &[&str] = &["created", "rendered", "destroyed", "autorun", "events"];

/// Returns `true` if `name` is reserved.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// The initial value of a property.
#[derive(Clone)]
pub enum Initial {
    /// A fixed value.
    Value(Value),
    /// Computed once, when the property is first added. Skipped entirely
    /// when the property is restored from a snapshot.
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl Initial {
    pub(crate) fn evaluate(&self) -> Value {
        match self {
            Initial::Value(value) => value.clone(),
            Initial::Lazy(init) => init(),
        }
    }
}

impl std::fmt::Debug for Initial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Initial::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Initial::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Derives a computed property from the viewmodel.
pub type ComputeFn = Arc<dyn Fn(&ViewModel) -> Value + Send + Sync>;

/// A callback receiving the viewmodel (autoruns and lifecycle hooks).
pub type ViewModelHook = Arc<dyn Fn(&ViewModel) + Send + Sync>;

/// An event handler receiving the viewmodel instead of the raw view.
pub type ViewModelEventHandler = Arc<dyn Fn(&Event, &ViewModel) + Send + Sync>;

/// A declarative viewmodel definition.
///
/// # Example
///
/// ```rust,ignore
/// let definition = Definition::new()
///     .prop("first", json!("Ada"))
///     .prop("last", json!("Lovelace"))
///     .computed("full", |vm| {
///         let first = vm.get("first").unwrap_or_default();
///         let last = vm.get("last").unwrap_or_default();
///         json!(format!("{} {}", first.as_str().unwrap_or(""), last.as_str().unwrap_or("")))
///     })
///     .on_rendered(|vm| tracing::info!(id = ?vm.id(), "rendered"));
/// ```
#[derive(Clone, Default)]
pub struct Definition {
    props: IndexMap<String, Initial>,
    computeds: IndexMap<String, ComputeFn>,
    autoruns: Vec<ViewModelHook>,
    created: Vec<ViewModelHook>,
    rendered: Vec<ViewModelHook>,
    destroyed: Vec<ViewModelHook>,
    events: IndexMap<String, ViewModelEventHandler>,
}

impl Definition {
    /// An empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a definition whose properties are the entries of a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(BindError::InvalidDefinition(format!(
                    "expected an object of initial values, got `{other}`"
                )))
            }
        };

        let mut definition = Self::new();
        for (name, initial) in map {
            if is_reserved(&name) {
                return Err(BindError::ReservedName(name));
            }
            definition.props.insert(name, Initial::Value(initial));
        }
        Ok(definition)
    }

    /// Add a property with a fixed initial value.
    pub fn prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), Initial::Value(value));
        self
    }

    /// Add a property whose initial value is produced on demand.
    pub fn prop_with<F>(mut self, name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.props.insert(name.into(), Initial::Lazy(Arc::new(init)));
        self
    }

    /// Add a computed property.
    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&ViewModel) -> Value + Send + Sync + 'static,
    {
        self.computeds.insert(name.into(), Arc::new(compute));
        self
    }

    /// Add an autorun. Autoruns start in declaration order.
    pub fn autorun<F>(mut self, run: F) -> Self
    where
        F: Fn(&ViewModel) + Send + Sync + 'static,
    {
        self.autoruns.push(Arc::new(run));
        self
    }

    /// Add a `created` callback.
    pub fn on_created<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ViewModel) + Send + Sync + 'static,
    {
        self.created.push(Arc::new(hook));
        self
    }

    /// Add a `rendered` callback.
    pub fn on_rendered<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ViewModel) + Send + Sync + 'static,
    {
        self.rendered.push(Arc::new(hook));
        self
    }

    /// Add a `destroyed` callback.
    pub fn on_destroyed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ViewModel) + Send + Sync + 'static,
    {
        self.destroyed.push(Arc::new(hook));
        self
    }

    /// Add an event handler, keyed like a template event map
    /// (`"change input.name"`).
    pub fn event<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Event, &ViewModel) + Send + Sync + 'static,
    {
        self.events.insert(key.into(), Arc::new(handler));
        self
    }

    pub fn props(&self) -> &IndexMap<String, Initial> {
        &self.props
    }

    pub fn computeds(&self) -> &IndexMap<String, ComputeFn> {
        &self.computeds
    }

    pub fn autoruns(&self) -> &[ViewModelHook] {
        &self.autoruns
    }

    pub fn created(&self) -> &[ViewModelHook] {
        &self.created
    }

    pub fn rendered(&self) -> &[ViewModelHook] {
        &self.rendered
    }

    pub fn destroyed(&self) -> &[ViewModelHook] {
        &self.destroyed
    }

    pub fn events(&self) -> &IndexMap<String, ViewModelEventHandler> {
        &self.events
    }

    /// Check every property and computed name against [`RESERVED_NAMES`].
    pub fn validate(&self) -> Result<()> {
        self.props
            .keys()
            .chain(self.computeds.keys())
            .find(|name| is_reserved(name))
            .map_or(Ok(()), |name| Err(BindError::ReservedName(name.clone())))
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("computeds", &self.computeds.keys().collect::<Vec<_>>())
            .field("autoruns", &self.autoruns.len())
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
