//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis two-way binding
//! engine. It connects reactive viewmodels to elements of a rendered
//! template tree and keeps them in sync in both directions.
//!
//! It implements:
//!
//! - Reactive primitives (properties, computeds, autoruns)
//! - Viewmodels with hierarchical property lookup
//! - A binding type registry with the built-in `checked` and `value` types
//! - Binding instances wired from declaration strings, with exhaustive
//!   teardown
//! - Viewmodel state restore across a full re-render
//! - A headless host (document, templates, views, renderer) to run it all
//!
//! # Architecture
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `viewmodel`: Viewmodels, definitions and hierarchy resolution
//! - `binding`: Registry, declaration parser, instance manager, built-ins
//! - `lifecycle`: Declaring viewmodels on templates, restore across reload
//! - `dom`, `template`: The headless host
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{declare, Definition, EngineConfig, Renderer, Template};
//! use serde_json::json;
//!
//! let config = EngineConfig::default();
//! let mut body = Template::new("body");
//! declare(&mut body, None, Definition::new().prop("done", json!(false)), &config)?;
//! body.render(|scope| {
//!     let checkbox = scope.element("input");
//!     scope.bind(&checkbox, "checked: done")
//! });
//!
//! let renderer = Renderer::new(config);
//! let view = renderer.mount(body)?;
//!
//! view.viewmodel().unwrap().set("done", json!(true))?;
//! // The checkbox is now checked.
//! ```

pub mod binding;
pub mod config;
pub mod dom;
pub mod error;
pub mod lifecycle;
pub mod reactive;
pub mod template;
pub mod viewmodel;

pub use binding::{add_binding, Binding, BindingDefinition, BindingRegistry, Setter};
pub use config::EngineConfig;
pub use dom::{Document, Element, Event};
pub use error::{BindError, Result};
pub use lifecycle::{declare, RestoreCoordinator, Snapshot};
pub use reactive::{Autorun, Computed, Property, Runtime};
pub use template::{RenderScope, Renderer, Template, View};
pub use viewmodel::{Definition, Hierarchy, ViewModel};
