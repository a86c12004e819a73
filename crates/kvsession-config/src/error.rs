//! Configuration error types.

use std::path::{Path, PathBuf};

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while reading, writing or validating session config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config file or its directory could not be accessed.
    #[error("cannot {action} config file {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode session config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but cannot be used.
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
