//! Binding Definitions
//!
//! A binding type is a triple:
//!
//! - `set(element, value)` pushes a property value into the element
//! - `on` lists the element events that mean "the user changed something"
//! - `get(event, element, setter)` reads the element and writes back through
//!   the setter
//!
//! A binding type is registered either as a fixed [`Binding`] or as a
//! factory that builds one per declaration from the bound property and the
//! declaration's arguments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::dom::{Element, Event};
use crate::error::{BindError, Result};
use crate::reactive::Runtime;
use crate::viewmodel::Slot;

/// Pushes a value into an element.
pub type SetFn = Arc<dyn Fn(&Element, &Value) + Send + Sync>;

/// Reads an element after an event and writes through the setter.
pub type GetFn = Arc<dyn Fn(&Event, &Element, &Setter) + Send + Sync>;

/// Builds a binding for one declaration.
pub type Factory = Arc<dyn Fn(&BindingContext<'_>) -> Result<Binding> + Send + Sync>;

/// A realized binding: the set/on/get triple.
#[derive(Clone, Default)]
pub struct Binding {
    set: Option<SetFn>,
    on: Vec<String>,
    get: Option<GetFn>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<F>(mut self, set: F) -> Self
    where
        F: Fn(&Element, &Value) + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(set));
        self
    }

    /// Space-separated event names. An empty list makes the binding one-way.
    pub fn on(mut self, events: &str) -> Self {
        self.on = events.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn get<F>(mut self, get: F) -> Self
    where
        F: Fn(&Event, &Element, &Setter) + Send + Sync + 'static,
    {
        self.get = Some(Arc::new(get));
        self
    }

    /// A `get` that returns the new value instead of calling the setter.
    pub fn read<F>(self, read: F) -> Self
    where
        F: Fn(&Event, &Element) -> Value + Send + Sync + 'static,
    {
        self.get(move |event, element, setter| {
            setter.set(read(event, element));
        })
    }

    pub fn set_fn(&self) -> Option<&SetFn> {
        self.set.as_ref()
    }

    pub fn events(&self) -> &[String] {
        &self.on
    }

    pub fn get_fn(&self) -> Option<&GetFn> {
        self.get.as_ref()
    }

    /// No DOM to property direction.
    pub fn is_one_way(&self) -> bool {
        self.on.is_empty() || self.get.is_none()
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        if self.set.is_none() && self.get.is_none() {
            return Err(BindError::InvalidDefinition(format!(
                "binding `{name}` has neither set nor get"
            )));
        }
        if !self.on.is_empty() && self.get.is_none() {
            return Err(BindError::InvalidDefinition(format!(
                "binding `{name}` listens for events but has no get"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("set", &self.set.is_some())
            .field("on", &self.on)
            .field("get", &self.get.is_some())
            .finish()
    }
}

/// What a factory sees of one declaration.
pub struct BindingContext<'a> {
    pub property: &'a Slot,
    pub path: &'a str,
    pub args: &'a [Value],
    pub kwargs: &'a IndexMap<String, Value>,
}

impl BindingContext<'_> {
    /// Positional argument `index`, not counting the property path.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// A keyword argument, falling back to a positional one.
    pub fn option(&self, name: &str, index: usize) -> Option<&Value> {
        self.kwarg(name).or_else(|| self.arg(index))
    }
}

/// A registered binding type.
#[derive(Clone)]
pub enum BindingDefinition {
    Static(Binding),
    Factory(Factory),
}

impl BindingDefinition {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&BindingContext<'_>) -> Result<Binding> + Send + Sync + 'static,
    {
        BindingDefinition::Factory(Arc::new(factory))
    }

    /// Produce the binding for one declaration.
    pub fn realize(&self, name: &str, context: &BindingContext<'_>) -> Result<Binding> {
        let binding = match self {
            BindingDefinition::Static(binding) => binding.clone(),
            BindingDefinition::Factory(factory) => factory(context)?,
        };
        binding.validate(name)?;
        Ok(binding)
    }
}

impl From<Binding> for BindingDefinition {
    fn from(binding: Binding) -> Self {
        BindingDefinition::Static(binding)
    }
}

impl std::fmt::Debug for BindingDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingDefinition::Static(binding) => f.debug_tuple("Static").field(binding).finish(),
            BindingDefinition::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Writes a value from the DOM back into the bound property.
///
/// Setters outlive their binding when a throttled call is still pending.
/// Once the binding is torn down every write is ignored.
#[derive(Clone)]
pub struct Setter {
    slot: Slot,
    path: Arc<str>,
    active: Arc<AtomicBool>,
}

impl Setter {
    pub(crate) fn new(slot: Slot, path: &str, active: Arc<AtomicBool>) -> Self {
        Self {
            slot,
            path: Arc::from(path),
            active,
        }
    }

    /// Write in a batch. Returns whether the value changed.
    pub fn try_set(&self, value: Value) -> Result<bool> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(BindError::Disposed);
        }
        Runtime::batch(|| self.slot.set(value))
    }

    /// Like [`try_set`](Self::try_set), but runtime errors are logged and
    /// swallowed.
    pub fn set(&self, value: Value) -> bool {
        match self.try_set(value) {
            Ok(changed) => changed,
            Err(BindError::Disposed) => {
                tracing::debug!(path = %self.path, "write after teardown ignored");
                false
            }
            Err(err) => {
                tracing::warn!(path = %self.path, error = %err, "binding write ignored");
                false
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Setter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setter")
            .field("path", &self.path)
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
