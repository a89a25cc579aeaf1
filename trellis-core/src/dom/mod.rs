//! Headless Document
//!
//! A minimal in-memory DOM: the surface the binding engine needs from a
//! host document and nothing more.
//!
//! - Elements with string attributes and live JSON properties
//!   (`value`, `checked`, ...)
//! - Event listeners with bubbling dispatch
//! - Removal hooks, fired once when an element leaves the document
//!
//! Writing a property never fires an event. A binding that pushes a value
//! into an element therefore cannot trigger its own `get` side.

mod node;
mod event;
mod document;

pub use node::{EventHandler, ListenerId, NodeId, RemovalHook};
pub use event::Event;
pub use document::{Document, Element};
