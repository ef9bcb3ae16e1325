//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::source::TomlConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Load a TOML configuration file into a [`TomlConfig`].
pub fn load_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    let shown = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: shown.clone(),
        source,
    })?;
    let config = TomlConfig::parse(&content).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;

    tracing::debug!(path = %shown, "Configuration loaded");
    Ok(config)
}
