//! Built-in Binding Types
//!
//! - `checked: path` keeps a checkbox's `checked` state and a boolean
//!   property in sync.
//! - `value: path` keeps an input's value and a property in sync. The
//!   DOM-to-property direction can be rate limited:
//!   - `throttle: ms` (or the first positional argument) throttles with the
//!     trailing edge only; add `leading: true` to also fire the first call
//!   - `debounce: ms` waits until input stops

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{BindError, Result};

use super::definition::{Binding, BindingContext, BindingDefinition};
use super::throttle::{Debounce, Throttle, ThrottlePolicy};

/// Events after which an input's value may have changed.
pub const VALUE_EVENTS: &str = "cut paste keyup input change";

/// The built-in binding types, by name.
pub fn builtins() -> Vec<(&'static str, BindingDefinition)> {
    vec![("checked", checked()), ("value", value())]
}

pub fn checked() -> BindingDefinition {
    Binding::new()
        .set(|element, value| element.set_checked(truthy(value)))
        .on("change")
        .read(|_, element| Value::Bool(element.checked()))
        .into()
}

pub fn value() -> BindingDefinition {
    BindingDefinition::factory(value_binding)
}

fn value_binding(context: &BindingContext<'_>) -> Result<Binding> {
    let throttle = context.option("throttle", 0).map(millis).transpose()?.flatten();
    let debounce = context.kwarg("debounce").map(millis).transpose()?.flatten();
    let leading = context.kwarg("leading").is_some_and(truthy);

    let binding = Binding::new()
        .set(|element, value| element.set_val(value.clone()))
        .on(VALUE_EVENTS);

    let binding = match (debounce, throttle) {
        (Some(wait), _) => {
            let debounce = Arc::new(Debounce::new(wait));
            binding.get(move |_, element, setter| {
                let element = element.clone();
                let setter = setter.clone();
                debounce.call(move || {
                    setter.set(element.val());
                });
            })
        }
        (None, Some(wait)) => {
            let policy = ThrottlePolicy::default().with_leading(leading);
            let throttle = Arc::new(Throttle::new(wait, policy));
            binding.get(move |_, element, setter| {
                let element = element.clone();
                let setter = setter.clone();
                throttle.call(move || {
                    setter.set(element.val());
                });
            })
        }
        (None, None) => binding.read(|_, element| element.val()),
    };

    Ok(binding)
}

/// A wait in milliseconds. Zero or a falsy value means no rate limiting.
fn millis(value: &Value) -> Result<Option<Duration>> {
    let ms = match value {
        Value::Null | Value::Bool(false) => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match ms {
        Some(ms) if ms.is_finite() && ms > 0.0 => Ok(Some(Duration::from_millis(ms as u64))),
        Some(ms) if ms.is_finite() && ms == 0.0 => Ok(None),
        _ => Err(BindError::InvalidDefinition(format!(
            "`{value}` is not a wait in milliseconds"
        ))),
    }
}

/// Loose truthiness for values pushed into boolean DOM state.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
