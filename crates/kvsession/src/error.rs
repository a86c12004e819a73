//! Error types for session manager operations.

/// Error type for session manager operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session store refused or failed the operation.
    #[error(transparent)]
    Store(#[from] kvsession_store::Error),

    /// The cache failed for a reason other than the store.
    #[error("Session cache error: {0}")]
    Cache(#[source] kvsession_cache::Error),
}

impl From<kvsession_cache::Error> for SessionError {
    fn from(err: kvsession_cache::Error) -> Self {
        // Store errors travel through the cache boxed; unwrap them so
        // callers can match on conflicts and write-gate violations.
        match err {
            kvsession_cache::Error::Persistence(source) => {
                match source.downcast::<kvsession_store::Error>() {
                    Ok(store) => SessionError::Store(*store),
                    Err(source) => {
                        SessionError::Cache(kvsession_cache::Error::Persistence(source))
                    }
                }
            }
            other => SessionError::Cache(other),
        }
    }
}

impl SessionError {
    /// Another writer updated or created the session first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SessionError::Store(e) if e.is_conflict())
    }

    /// The session was saved without a write grant.
    pub fn is_write_not_permitted(&self) -> bool {
        matches!(
            self,
            SessionError::Store(kvsession_store::Error::WriteNotPermitted(_))
        )
    }
}

/// Result type for session manager operations.
pub type Result<T> = std::result::Result<T, SessionError>;
