//! Request-facing session manager.
//!
//! Combines a [`SessionStore`] with an in-memory [`SessionCache`] so that
//! every request touching a session id shares one record. The write gate
//! is granted per request through [`SessionAccess`]; records are flushed
//! when a request completes and passivated when they leave memory.

use std::sync::Arc;

use kvsession_cache::{CacheConfig, SessionCache};
use kvsession_config::{HasCacheConfig, HasStoreConfig};
use kvsession_store::{SessionStore, StorageClient, StoreConfig, now_millis};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::access::SessionAccess;
use crate::error::Result;
use crate::persistence::{SharedSession, StorePersistence};

/// Serves sessions to requests from memory, backed by a [`SessionStore`].
pub struct SessionManager<S: StorageClient + ?Sized + 'static> {
    store: Arc<SessionStore<S>>,
    cache: SessionCache<StorePersistence<S>>,
}

impl<S: StorageClient + ?Sized + 'static> SessionManager<S> {
    /// Create a manager over an existing store.
    pub fn new(store: Arc<SessionStore<S>>, cache_config: CacheConfig) -> Self {
        let persistence = StorePersistence::new(Arc::clone(&store));
        Self {
            store,
            cache: SessionCache::with_persistence(cache_config, persistence),
        }
    }

    /// Create a manager from a configuration provider.
    pub fn from_config<C: HasStoreConfig + HasCacheConfig>(client: Arc<S>, config: &C) -> Self {
        let store = SessionStore::new(client, store_config(config));
        Self::new(Arc::new(store), cache_config(config))
    }

    pub fn store(&self) -> &Arc<SessionStore<S>> {
        &self.store
    }

    /// Get the session for a request.
    ///
    /// Loads the session on a cache miss. If storage has none, a new session
    /// is created when `access.create` is set, otherwise `Ok(None)` is
    /// returned. The session is touched, and granted write access when
    /// `access.write` is set. A grant lasts as long as the record stays in
    /// memory. While the returned handle is held the session is not evicted,
    /// so a later [`complete`](Self::complete) always finds it.
    pub async fn session(&self, id: &str, access: SessionAccess) -> Result<Option<SharedSession>> {
        let session = match self.cache.get_or_load(id).await {
            Ok(session) => session,
            Err(kvsession_cache::Error::NotFound(_)) if access.create => {
                let now = now_millis();
                let record = self
                    .store
                    .new_session(id, now, now, now, self.max_inactive_ms());
                debug!(session_id = %id, "Creating new session");
                self.cache
                    .insert_if_absent(id, Arc::new(RwLock::new(record)))
                    .await
            }
            Err(kvsession_cache::Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        {
            let mut record = session.write();
            record.touch(now_millis());
            if access.write {
                record.set_writable(true);
            }
        }

        Ok(Some(session))
    }

    /// Flush a session at the end of a request.
    ///
    /// New sessions are inserted and write-granted sessions are updated.
    /// Read-only sessions are left alone.
    pub async fn complete(&self, id: &str) -> Result<()> {
        self.cache.save(id).await?;
        Ok(())
    }

    /// Drop a session from memory and storage.
    ///
    /// Returns whether storage held it.
    pub async fn invalidate(&self, id: &str) -> Result<bool> {
        let removed = self.cache.remove(id).await?;
        debug!(session_id = %id, removed, "Session invalidated");
        Ok(removed)
    }

    /// Check memory, then storage.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.cache.exists(id).await?)
    }

    pub async fn cached_sessions(&self) -> Vec<String> {
        self.cache.list_cached().await
    }

    /// Start the periodic idle sweep.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        self.cache.spawn_cleanup()
    }

    /// Passivate every cached session, then stop the store.
    ///
    /// Returns the number of sessions that were in memory.
    pub async fn shutdown(&self) -> usize {
        let count = self.cache.shutdown().await;
        self.store.stop();
        info!(sessions = count, "Session manager shut down");
        count
    }

    fn max_inactive_ms(&self) -> i64 {
        i64::try_from(self.store.config().max_inactive_interval.as_millis()).unwrap_or(i64::MAX)
    }
}

impl<S: StorageClient + ?Sized + 'static> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
        }
    }
}

fn store_config<C: HasStoreConfig>(config: &C) -> StoreConfig {
    StoreConfig::new(config.key_prefix())
        .with_max_inactive_interval(config.max_inactive_interval())
        .with_context(config.context_path(), config.virtual_host())
}

fn cache_config<C: HasCacheConfig>(config: &C) -> CacheConfig {
    CacheConfig {
        max_sessions: config.max_sessions(),
        idle_ttl: config.idle_ttl(),
        cleanup_interval: config.cleanup_interval(),
    }
}
