//! Bindings
//!
//! Everything between a `"value: name, throttle: 300"` declaration and the
//! live two-way sync it produces:
//!
//! - [`registry`](BindingRegistry): binding type names to definitions
//! - [`parse`]: declaration strings to [`Declaration`]s
//! - [`BindingManager`]: resolution, wiring and teardown
//! - built-in `checked` and `value` types, with throttle and debounce

mod builtin;
mod definition;
mod manager;
mod parse;
mod registry;
mod throttle;

pub use builtin::{builtins, checked, value, VALUE_EVENTS};
pub use definition::{Binding, BindingContext, BindingDefinition, Factory, GetFn, SetFn, Setter};
pub use manager::{BindingInstance, BindingManager};
pub use parse::{literal, parse, Declaration};
pub use registry::{add_binding, BindingRegistry};
pub use throttle::{Debounce, Throttle, ThrottlePolicy};
