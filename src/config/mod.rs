//! Engine configuration.
//!
//! Configuration is a small serde struct, loaded from TOML or built in
//! code. Every field has a default, so an empty document is valid.
//!
//! ```toml
//! # Upper bound on step executions per run. Omit for the default.
//! max_steps = 250
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;

pub use error::ConfigError;

/// Default bound on step executions per run.
pub const DEFAULT_MAX_STEPS: usize = 1_000;

/// Execution settings shared by every run of a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of step executions in one run before the run fails
    /// with an iteration-limit error. `None` lets cycles run unbounded.
    pub max_steps: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(DEFAULT_MAX_STEPS),
        }
    }
}

impl EngineConfig {
    /// Config with no iteration guard. A router that never picks a
    /// termination will then loop forever.
    pub fn unbounded() -> Self {
        Self { max_steps: None }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == Some(0) {
            return Err(ConfigError::Invalid(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_steps, Some(DEFAULT_MAX_STEPS));
    }

    #[test]
    fn max_steps_is_read() {
        let config = EngineConfig::from_toml_str("max_steps = 25").unwrap();
        assert_eq!(config.max_steps, Some(25));
    }

    #[test]
    fn zero_max_steps_is_rejected() {
        let result = EngineConfig::from_toml_str("max_steps = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = EngineConfig::from_toml_str("max_steps = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = EngineConfig::from_file("/nonexistent/stepgraph.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn unbounded_disables_guard() {
        assert_eq!(EngineConfig::unbounded().max_steps, None);
        assert_eq!(EngineConfig::unbounded().with_max_steps(5).max_steps, Some(5));
    }
}
