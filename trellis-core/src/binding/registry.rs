//! Binding Type Registry
//!
//! Maps binding type names (`checked`, `value`, ...) to their definitions.
//! The process-wide registry is created on first use with the built-in
//! types already in it. Hosts that want isolation build their own with
//! [`BindingRegistry::with_builtins`] and hand it to the renderer.
//!
//! Names are case-sensitive and registered at most once. After
//! [`seal`](BindingRegistry::seal) no further types are accepted; the
//! renderer seals its registry when it mounts the first body.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{BindError, Result};

use super::builtin;
use super::definition::BindingDefinition;

/// A table of binding types.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    types: DashMap<String, BindingDefinition>,
    sealed: AtomicBool,
}

impl BindingRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in binding types.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (name, definition) in builtin::builtins() {
            registry.types.insert(name.to_string(), definition);
        }
        registry
    }

    /// The process-wide registry.
    pub fn global() -> Arc<BindingRegistry> {
        static GLOBAL: OnceLock<Arc<BindingRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(BindingRegistry::with_builtins()))
            .clone()
    }

    /// Register a binding type.
    pub fn add_binding(
        &self,
        name: impl Into<String>,
        definition: impl Into<BindingDefinition>,
    ) -> Result<()> {
        let name = name.into();
        if self.is_sealed() {
            return Err(BindError::RegistrySealed(name));
        }
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ':' || c == ',') {
            return Err(BindError::InvalidDefinition(format!(
                "`{name}` is not a valid binding type name"
            )));
        }

        match self.types.entry(name) {
            Entry::Occupied(entry) => Err(BindError::DuplicateBinding(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(binding = %entry.key(), "binding type registered");
                entry.insert(definition.into());
                Ok(())
            }
        }
    }

    /// Look up a binding type.
    pub fn resolve(&self, name: &str) -> Result<BindingDefinition> {
        self.types
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BindError::UnknownBinding(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Refuse all further registrations.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Register a binding type on the process-wide registry.
pub fn add_binding(
    name: impl Into<String>,
    definition: impl Into<BindingDefinition>,
) -> Result<()> {
    BindingRegistry::global().add_binding(name, definition)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
