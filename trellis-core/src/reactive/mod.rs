//! Reactive Primitives
//!
//! This module implements the reactive system underneath every viewmodel:
//! properties, computeds, and autoruns.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A Property is a named container for mutable state. When it is read within
//! a tracking context (a computed, an autorun, or a binding's DOM update),
//! the property registers that context as a dependent. When its value
//! changes, all dependents re-run before the write returns.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes, and only propagates when its
//! result actually differs.
//!
//! ## Autoruns
//!
//! An Autorun is a side-effecting computation that runs whenever its
//! dependencies change. Bindings use autoruns to push property values into
//! DOM elements.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically, and a thread-local batch queue so that a
//! computation invalidated several times during one write runs once. Work
//! finished on another thread (a timer on a multi-threaded runtime) is handed
//! back through [`Deferred`] so it runs where that state lives.

mod subscriber;
mod context;
mod runtime;
mod property;
mod computed;
mod autorun;
mod deferred;

pub use subscriber::{Dependents, Reactive, SubscriberId};
pub use context::ReactiveContext;
pub use runtime::Runtime;
pub use property::Property;
pub use computed::{Computed, ComputedState};
pub use autorun::Autorun;
pub use deferred::{Deferred, Job};
