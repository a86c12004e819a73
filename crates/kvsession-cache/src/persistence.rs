//! Persistence hooks for session loading and saving.
//!
//! The [`PersistenceHook`] trait decouples the cache from the storage
//! backend. Its associated `Value` type is what the cache holds in memory,
//! so a backend can hand out shared, lockable records without the cache
//! knowing their shape.

use crate::error::Result;

/// Trait for persistence backends.
///
/// The cache calls `load` on a miss, `save` when a session is flushed,
/// `delete` when a session is removed, and `on_evict` whenever a session
/// leaves memory for any other reason (capacity, idleness, shutdown).
/// No hook method is called while the cache lock is held, so hooks may
/// block or call back into the cache.
pub trait PersistenceHook: Send + Sync {
    /// The value type stored in the cache.
    type Value: Clone + Send + Sync + 'static;

    /// Load a session from storage.
    ///
    /// Return `Ok(None)` if the session doesn't exist in storage.
    fn load(&self, session_id: &str) -> Result<Option<Self::Value>>;

    /// Save a session to storage.
    fn save(&self, session_id: &str, value: &Self::Value) -> Result<()>;

    /// Delete a session from storage, returning whether anything was removed.
    fn delete(&self, session_id: &str) -> Result<bool>;

    /// Whether storage holds the session.
    fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.load(session_id)?.is_some())
    }

    /// Whether someone outside the cache still holds `value`.
    ///
    /// In-use sessions are never evicted for capacity or idleness, only on
    /// shutdown. Default reports nothing as in use.
    fn in_use(&self, _value: &Self::Value) -> bool {
        false
    }

    /// Called when a session leaves the cache without being deleted.
    ///
    /// This is the chance to passivate unsaved state. Default does nothing.
    fn on_evict(&self, _session_id: &str, _value: &Self::Value) -> Result<()> {
        Ok(())
    }
}
