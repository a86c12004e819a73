//! Persistence hook that backs the session cache with a [`SessionStore`].

use std::sync::Arc;

use kvsession_cache::PersistenceHook;
use kvsession_store::{SessionRecord, SessionStore, StorageClient};
use parking_lot::RwLock;
use tracing::trace;

/// A session record shared by identity between the cache and every request
/// currently using it.
pub type SharedSession = Arc<RwLock<SessionRecord>>;

/// Loads cache misses from the store and writes flushed or evicted records back.
///
/// Only records that can legally be written are persisted: records that
/// have never been stored, and records holding a write grant. A read-only
/// record cannot carry attribute changes, and reading it already refreshed
/// its storage TTL, so flushing it is skipped.
pub struct StorePersistence<S: StorageClient + ?Sized> {
    store: Arc<SessionStore<S>>,
}

impl<S: StorageClient + ?Sized> StorePersistence<S> {
    pub fn new(store: Arc<SessionStore<S>>) -> Self {
        Self { store }
    }

    fn persist(&self, session_id: &str, session: &SharedSession) -> kvsession_store::Result<()> {
        let mut record = session.write();
        if !record.is_new() && !record.is_writable() {
            trace!(session_id = %session_id, "Read-only session, nothing to persist");
            return Ok(());
        }
        self.store.save(session_id, &mut record)
    }
}

impl<S: StorageClient + ?Sized> PersistenceHook for StorePersistence<S> {
    type Value = SharedSession;

    fn load(&self, session_id: &str) -> kvsession_cache::Result<Option<SharedSession>> {
        let record = self
            .store
            .load(session_id)
            .map_err(kvsession_cache::Error::persistence)?;
        Ok(record.map(|r| Arc::new(RwLock::new(r))))
    }

    fn save(&self, session_id: &str, value: &SharedSession) -> kvsession_cache::Result<()> {
        self.persist(session_id, value)
            .map_err(kvsession_cache::Error::persistence)
    }

    fn delete(&self, session_id: &str) -> kvsession_cache::Result<bool> {
        Ok(self.store.delete(session_id))
    }

    fn exists(&self, session_id: &str) -> kvsession_cache::Result<bool> {
        self.store
            .exists(session_id)
            .map_err(kvsession_cache::Error::persistence)
    }

    /// A record is in use while any request still holds a handle to it.
    fn in_use(&self, value: &SharedSession) -> bool {
        Arc::strong_count(value) > 1
    }

    fn on_evict(&self, session_id: &str, value: &SharedSession) -> kvsession_cache::Result<()> {
        self.persist(session_id, value)
            .map_err(kvsession_cache::Error::persistence)
    }
}
