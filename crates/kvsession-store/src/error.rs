//! Error types for session store operations.

use crate::codec::CodecError;
use crate::record::WriteNotPermitted;
use crate::storage::StorageError;

/// Error type for session store operations.
///
/// Every variant except [`Error::WriteNotPermitted`] names the storage key
/// the failing call was working on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A save was attempted on a record without a write grant.
    #[error(transparent)]
    WriteNotPermitted(#[from] WriteNotPermitted),

    /// Another writer won: the key already existed, or the token was stale.
    #[error("Conflicting write for {key}: {source}")]
    Conflict {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The record could not be encoded.
    #[error("Failed to serialize session {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: CodecError,
    },

    /// A stored document could not be decoded.
    #[error("Failed to deserialize session {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: CodecError,
    },

    /// An update was attempted for a record that holds no concurrency token.
    #[error("No concurrency token for {key}; the session was never read from or written to storage")]
    MissingToken { key: String },

    /// Any other storage failure.
    #[error("Storage error for {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl Error {
    /// Classify a storage client failure for `key`.
    pub(crate) fn from_storage(key: &str, source: StorageError) -> Self {
        if source.is_conflict() {
            Error::Conflict {
                key: key.to_string(),
                source,
            }
        } else {
            Error::Storage {
                key: key.to_string(),
                source,
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
