//! Error types for session cache operations.

/// Boxed error raised by a persistence backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session was not found in cache or storage.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Error from persistence backend. The underlying error is kept as the
    /// source so callers can downcast it.
    #[error("Persistence error: {0}")]
    Persistence(#[source] BoxError),
}

impl Error {
    /// Wrap a backend error.
    pub fn persistence(err: impl Into<BoxError>) -> Self {
        Error::Persistence(err.into())
    }
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;
