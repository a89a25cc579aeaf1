//! Error Types
//!
//! Every fallible operation in the engine returns [`BindError`].
//!
//! Errors fall into two groups:
//!
//! - **Configuration errors** are programmer mistakes in template authoring
//!   (a duplicate binding type, an unknown binding type, a property path
//!   that does not resolve). They are returned immediately from the call
//!   that discovered them and are never retried.
//!
//! - **Runtime binding errors** happen when a binding instance outlives the
//!   thing it was attached to (a throttled write lands after the element
//!   was removed, a write targets a computed). The engine recovers from these locally by treating the
//!   instance as torn down; they are logged, not surfaced.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BindError>;

/// Errors produced by the binding engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A binding type with this name is already registered.
    #[error("binding type `{0}` is already registered")]
    DuplicateBinding(String),

    /// No binding type with this name is registered.
    #[error("unknown binding type `{0}`")]
    UnknownBinding(String),

    /// The registry was sealed before this binding type was registered.
    #[error("binding registry is sealed, cannot register `{0}`")]
    RegistrySealed(String),

    /// A binding declaration string could not be parsed.
    #[error("malformed binding declaration `{input}`: {reason}")]
    Declaration { input: String, reason: String },

    /// No viewmodel exists on the view or any of its ancestors.
    #[error("no viewmodel found above template `{template}`")]
    NoViewModel { template: String },

    /// No viewmodel with the requested name exists above the view.
    #[error("no viewmodel named `{name}` found above template `{template}`")]
    ViewModelNotFound { name: String, template: String },

    /// The property is not defined on any viewmodel that was searched.
    #[error("property `{0}` is not defined on any enclosing viewmodel")]
    PropertyNotFound(String),

    /// A viewmodel or binding definition is malformed.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// Engine configuration could not be read.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// A property used a name reserved for lifecycle hooks or events.
    #[error("`{0}` is a reserved viewmodel name")]
    ReservedName(String),

    /// The template has no bind helper and does not use global bindings.
    #[error("template `{template}` has no `{helper}` helper")]
    MissingHelper { template: String, helper: String },

    /// A computed property was the target of a write.
    #[error("property `{0}` is computed and cannot be written")]
    ReadOnly(String),

    /// The binding or viewmodel behind a write was already torn down.
    #[error("binding was torn down")]
    Disposed,

    /// The renderer has no mounted body template.
    #[error("no body template is mounted")]
    NotMounted,

    /// A restore snapshot could not be encoded or decoded.
    #[error("restore snapshot is unreadable: {0}")]
    Snapshot(String),
}

impl BindError {
    /// Whether this error is a template-authoring mistake that must be
    /// surfaced to the host rather than recovered from.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BindError::DuplicateBinding(_)
                | BindError::UnknownBinding(_)
                | BindError::RegistrySealed(_)
                | BindError::Declaration { .. }
                | BindError::NoViewModel { .. }
                | BindError::ViewModelNotFound { .. }
                | BindError::PropertyNotFound(_)
                | BindError::InvalidDefinition(_)
                | BindError::Config(_)
                | BindError::ReservedName(_)
                | BindError::MissingHelper { .. }
        )
    }

    pub(crate) fn declaration(input: &str, reason: impl Into<String>) -> Self {
        BindError::Declaration {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
