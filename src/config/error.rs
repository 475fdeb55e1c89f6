//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config text is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but holds an unusable value
    #[error("Invalid config value: {0}")]
    Invalid(String),
}
