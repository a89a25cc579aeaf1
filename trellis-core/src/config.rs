//! Engine Configuration

use serde::{Deserialize, Serialize};

use crate::error::{BindError, Result};

/// Settings shared by the renderer and `declare`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the template helper that carries binding declarations.
    pub helper_name: String,

    /// Global mode: every template may bind, unresolved lookups fall back to
    /// the global viewmodel, and `declare` does not register a helper.
    pub global: bool,

    /// Carry viewmodel state across [`Renderer::reload`](crate::Renderer::reload).
    pub restore: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            helper_name: "bind".to_string(),
            global: false,
            restore: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_helper_name(mut self, name: impl Into<String>) -> Self {
        self.helper_name = name.into();
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Read a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| BindError::Config(err.to_string()))?;
        if config.helper_name.trim().is_empty() {
            return Err(BindError::Config("helper_name must not be empty".into()));
        }
        Ok(config)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.helper_name, "bind");
        assert!(!config.global);
        assert!(config.restore);
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config = EngineConfig::from_json(r#"{"global": true}"#).unwrap();
        assert!(config.global);
        assert_eq!(config.helper_name, "bind");
    }

    #[test]
    fn from_json_rejects_bad_input() {
        assert!(matches!(
            EngineConfig::from_json("{nope"),
            Err(BindError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"helper_name": " "}"#),
            Err(BindError::Config(_))
        ));
    }
}
