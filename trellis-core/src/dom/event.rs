//! DOM events.

use super::document::Element;

/// An event being dispatched through the document.
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    target: Element,
    current_target: Element,
}

impl Event {
    pub(crate) fn new(kind: impl Into<String>, target: Element, current_target: Element) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target,
        }
    }

    /// The event type, e.g. `"change"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The element the event was fired at.
    pub fn target(&self) -> &Element {
        &self.target
    }

    /// The element whose listener is running (differs from the target while
    /// the event bubbles).
    pub fn current_target(&self) -> &Element {
        &self.current_target
    }
}
