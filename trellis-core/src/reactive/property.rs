//! Property Implementation
//!
//! A Property is the fundamental reactive primitive: one named cell inside a
//! viewmodel. It holds a value and tracks which computations depend on it.
//!
//! # How Properties Work
//!
//! 1. When a property is read within a reactive context (autorun, computed,
//!    binding update), the property registers that context as a dependent.
//!
//! 2. When a property's value changes, every dependent is invalidated and
//!    re-runs before `set` returns.
//!
//! 3. Reads outside a reactive context are plain snapshots.
//!
//! # Equality
//!
//! A write only counts as a change if the new value is not structurally
//! equal to the old one (`serde_json::Value`'s `PartialEq`). Writing an
//! equal value notifies nobody, which is what stops a DOM update from
//! feeding back into the property it came from.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::subscriber::Dependents;

/// A named reactive cell holding a JSON value.
///
/// Cloning a property yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Property::new("count", json!(0));
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (re-runs dependents)
/// count.set(json!(5));
/// ```
#[derive(Clone)]
pub struct Property {
    inner: Arc<PropertyInner>,
}

struct PropertyInner {
    name: String,
    value: RwLock<Value>,
    dependents: Arc<Dependents>,
}

impl Property {
    /// Create a new property with the given initial value.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                name: name.into(),
                value: RwLock::new(value),
                dependents: Dependents::new(),
            }),
        }
    }

    /// Get the property's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.dependents.id()
    }

    /// Get the property's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> Value {
        self.inner.dependents.track();
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Value {
        self.inner.value.read().clone()
    }

    /// Set a new value and re-run dependents if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: Value) -> bool {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }

        self.inner.dependents.notify();
        true
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Value) -> Value,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value)
    }

    /// Get the number of computations depending on this property.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dependents.len()
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Property) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.inner.name)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
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

    #[test]
    fn property_get_and_set() {
        let property = Property::new("count", json!(0));
        assert_eq!(property.get(), json!(0));

        assert!(property.set(json!(42)));
        assert_eq!(property.get(), json!(42));
    }

    #[test]
    fn equal_write_is_not_a_change() {
        let property = Property::new("tags", json!(["a", "b"]));
        assert!(!property.set(json!(["a", "b"])));
        assert!(property.set(json!(["a"])));
    }

    #[test]
    fn property_update() {
        let property = Property::new("count", json!(10));
        property.update(|v| json!(v.as_i64().unwrap_or(0) + 5));
        assert_eq!(property.get(), json!(15));
    }

    #[test]
    fn property_clone_shares_state() {
        let property1 = Property::new("name", json!("a"));
        let property2 = property1.clone();

        property1.set(json!("b"));
        assert_eq!(property2.get(), json!("b"));
        assert!(property1.ptr_eq(&property2));
        assert_eq!(property1.id(), property2.id());
    }

    #[test]
    fn property_ids_are_unique() {
        let p1 = Property::new("a", Value::Null);
        let p2 = Property::new("a", Value::Null);
        assert_ne!(p1.id(), p2.id());
        assert!(!p1.ptr_eq(&p2));
    }
}
