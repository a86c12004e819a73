//! Session cache with LRU eviction and idle expiry.
//!
//! Sessions leaving memory are passivated through
//! [`PersistenceHook::on_evict`] only after the cache lock is released, so
//! a slow or blocking hook never stalls other cache operations. Values the
//! hook reports as in use are never evicted for capacity or idleness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::idle::IdleTracker;
use crate::persistence::PersistenceHook;

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    cached_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
        }
    }
}

/// An entry removed from memory, waiting to be passivated.
struct Departed<V> {
    session_id: String,
    entry: CacheEntry<V>,
    reason: &'static str,
}

/// Inner state protected by RwLock.
struct CacheInner<V> {
    lru: LruCache<String, CacheEntry<V>>,
    idle: IdleTracker,
}

impl<V> CacheInner<V> {
    fn take(&mut self, session_id: &str) -> Option<CacheEntry<V>> {
        self.idle.remove(session_id);
        self.lru.pop(session_id)
    }
}

/// Session cache with LRU eviction and optional idle expiry.
///
/// This cache provides:
/// - LRU eviction when max capacity is reached
/// - Optional idle expiry, swept on access and by [`cleanup_expired`](Self::cleanup_expired)
/// - Persistence hooks for loading, saving and passivating sessions
/// - Thread-safe access via RwLock
///
/// Values are cloned out of the cache. Hooks that need callers to share one
/// session by identity should use a shared handle (e.g. `Arc`) as `Value`,
/// and report held handles through [`PersistenceHook::in_use`]. When every
/// cached session is in use the cache grows past `max_sessions` until some
/// are released.
pub struct SessionCache<P: PersistenceHook> {
    inner: Arc<RwLock<CacheInner<P::Value>>>,
    persistence: Arc<P>,
    config: CacheConfig,
}

impl<P: PersistenceHook> SessionCache<P> {
    /// Create a new session cache over a persistence backend.
    pub fn with_persistence(config: CacheConfig, persistence: P) -> Self {
        let inner = CacheInner {
            lru: LruCache::unbounded(),
            idle: IdleTracker::new(config.idle_ttl),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            persistence: Arc::new(persistence),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the current number of cached sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    /// Get a session from cache or load it from persistence.
    ///
    /// Marks the session as recently used and resets its idle timer.
    /// Returns [`Error::NotFound`] if storage has no such session.
    pub async fn get_or_load(&self, session_id: &str) -> Result<P::Value> {
        let mut departed = Vec::new();
        {
            let mut inner = self.inner.write().await;

            if self.is_expired(&inner, session_id) {
                if let Some(entry) = inner.take(session_id) {
                    departed.push(Departed {
                        session_id: session_id.to_string(),
                        entry,
                        reason: "idle",
                    });
                }
            } else if let Some(entry) = inner.lru.get(session_id) {
                trace!(session_id = %session_id, "Session found in cache");
                let value = entry.value.clone();
                inner.idle.touch(session_id);
                return Ok(value);
            }
        }
        // Passivate before loading so the load sees what was just written.
        self.passivate(departed);

        debug!(session_id = %session_id, "Session cache miss, loading from persistence");

        let Some(value) = self.persistence.load(session_id)? else {
            return Err(Error::NotFound(session_id.to_string()));
        };

        let mut inner = self.inner.write().await;
        // Another caller may have cached the session while we were loading;
        // keep theirs so every holder shares one value.
        if let Some(existing) = inner.lru.get(session_id) {
            let existing = existing.value.clone();
            inner.idle.touch(session_id);
            return Ok(existing);
        }

        let departed = self.put(&mut inner, session_id, value.clone());
        debug!(
            session_id = %session_id,
            cache_size = inner.lru.len(),
            "Session loaded from persistence"
        );
        drop(inner);
        self.passivate(departed);
        Ok(value)
    }

    /// Insert a session into the cache.
    ///
    /// If the cache is over capacity, the least recently used session that
    /// is not in use is evicted through [`PersistenceHook::on_evict`].
    pub async fn insert(&self, session_id: &str, value: P::Value) {
        let mut inner = self.inner.write().await;
        let departed = self.put(&mut inner, session_id, value);

        trace!(
            session_id = %session_id,
            cache_size = inner.lru.len(),
            "Session inserted into cache"
        );
        drop(inner);
        self.passivate(departed);
    }

    /// Insert a session unless one is already cached under this id.
    ///
    /// Returns the value that ends up cached, so concurrent creators of the
    /// same session all receive the same value.
    pub async fn insert_if_absent(&self, session_id: &str, value: P::Value) -> P::Value {
        let mut inner = self.inner.write().await;
        let mut departed = Vec::new();

        if self.is_expired(&inner, session_id) {
            if let Some(entry) = inner.take(session_id) {
                departed.push(Departed {
                    session_id: session_id.to_string(),
                    entry,
                    reason: "idle",
                });
            }
        } else if let Some(existing) = inner.lru.get(session_id) {
            let existing = existing.value.clone();
            inner.idle.touch(session_id);
            return existing;
        }

        departed.extend(self.put(&mut inner, session_id, value.clone()));
        drop(inner);
        self.passivate(departed);
        value
    }

    /// Cache `value` and evict down to capacity, skipping values in use.
    fn put(
        &self,
        inner: &mut CacheInner<P::Value>,
        session_id: &str,
        value: P::Value,
    ) -> Vec<Departed<P::Value>> {
        inner
            .lru
            .put(session_id.to_string(), CacheEntry::new(value));
        inner.idle.touch(session_id);

        let capacity = self.config.max_sessions.max(1);
        let mut departed = Vec::new();
        while inner.lru.len() > capacity {
            let victim = inner
                .lru
                .iter()
                .rev()
                .find(|(id, entry)| {
                    id.as_str() != session_id && !self.persistence.in_use(&entry.value)
                })
                .map(|(id, _)| id.clone());

            let Some(victim) = victim else {
                debug!(
                    cache_size = inner.lru.len(),
                    capacity = capacity,
                    "Every cached session is in use, cache over capacity"
                );
                break;
            };
            if let Some(entry) = inner.take(&victim) {
                departed.push(Departed {
                    session_id: victim,
                    entry,
                    reason: "capacity",
                });
            }
        }
        departed
    }

    /// Idle and not held by anyone else.
    fn is_expired(&self, inner: &CacheInner<P::Value>, session_id: &str) -> bool {
        inner.idle.is_idle(session_id)
            && !inner
                .lru
                .peek(session_id)
                .is_some_and(|e| self.persistence.in_use(&e.value))
    }

    /// Hand entries that left memory to the persistence hook.
    ///
    /// Must be called without the cache lock held.
    fn passivate(&self, departed: Vec<Departed<P::Value>>) {
        for Departed {
            session_id,
            entry,
            reason,
        } in departed
        {
            debug!(
                session_id = %session_id,
                reason = reason,
                cached_for_ms = entry.cached_at.elapsed().as_millis() as u64,
                "Evicting session"
            );
            if let Err(e) = self.persistence.on_evict(&session_id, &entry.value) {
                warn!(session_id = %session_id, error = %e, "Failed to passivate evicted session");
            }
        }
    }

    /// Save a cached session to persistence.
    pub async fn save(&self, session_id: &str) -> Result<()> {
        let value = {
            let inner = self.inner.read().await;
            inner.lru.peek(session_id).map(|e| e.value.clone())
        };

        match value {
            Some(value) => self.persistence.save(session_id, &value),
            None => Err(Error::NotFound(session_id.to_string())),
        }
    }

    /// Check if a session is cached (without loading).
    pub async fn contains(&self, session_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.lru.contains(session_id) && !self.is_expired(&inner, session_id)
    }

    /// Check the cache, then storage.
    pub async fn exists(&self, session_id: &str) -> Result<bool> {
        if self.contains(session_id).await {
            return Ok(true);
        }
        self.persistence.exists(session_id)
    }

    /// Peek at a session without updating LRU order or idle time.
    pub async fn peek(&self, session_id: &str) -> Option<P::Value> {
        let inner = self.inner.read().await;
        if self.is_expired(&inner, session_id) {
            None
        } else {
            inner.lru.peek(session_id).map(|e| e.value.clone())
        }
    }

    /// Remove a session from cache and delete it from persistence.
    ///
    /// Returns whether storage held a document for it.
    pub async fn remove(&self, session_id: &str) -> Result<bool> {
        self.inner.write().await.take(session_id);
        self.persistence.delete(session_id)
    }

    /// Drop a session from memory only, passivating it first.
    pub async fn invalidate(&self, session_id: &str) {
        let entry = self.inner.write().await.take(session_id);
        if let Some(entry) = entry {
            self.passivate(vec![Departed {
                session_id: session_id.to_string(),
                entry,
                reason: "invalidated",
            }]);
        }
    }

    /// Evict every idle session that is not in use. Returns how many were evicted.
    pub async fn cleanup_expired(&self) -> usize {
        let departed = {
            let mut inner = self.inner.write().await;
            let mut departed = Vec::new();

            for session_id in inner.idle.drain_idle_at(Instant::now()) {
                let held = inner
                    .lru
                    .peek(&session_id)
                    .is_some_and(|e| self.persistence.in_use(&e.value));
                if held {
                    inner.idle.touch(&session_id);
                } else if let Some(entry) = inner.lru.pop(&session_id) {
                    departed.push(Departed {
                        session_id,
                        entry,
                        reason: "idle",
                    });
                }
            }
            departed
        };

        let count = departed.len();
        self.passivate(departed);
        if count > 0 {
            debug!(count = count, "Cleaned up idle sessions");
        }
        count
    }

    /// Passivate and drop every cached session, in use or not.
    /// Returns how many were dropped.
    pub async fn shutdown(&self) -> usize {
        let departed: Vec<_> = {
            let mut inner = self.inner.write().await;
            inner.idle.clear();
            std::iter::from_fn(|| inner.lru.pop_lru())
                .map(|(session_id, entry)| Departed {
                    session_id,
                    entry,
                    reason: "shutdown",
                })
                .collect()
        };

        let count = departed.len();
        self.passivate(departed);
        debug!(count = count, "Session cache shut down");
        count
    }

    /// List all cached, non-idle session IDs.
    pub async fn list_cached(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .lru
            .iter()
            .filter(|(id, _)| !self.is_expired(&inner, id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            size: inner.lru.len(),
            capacity: self.config.max_sessions,
            idle_tracked: inner.idle.len(),
        }
    }
}

impl<P: PersistenceHook + 'static> SessionCache<P> {
    /// Run [`cleanup_expired`](Self::cleanup_expired) every `cleanup_interval`
    /// until the returned task is aborted.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.config.cleanup_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.cleanup_expired().await;
            }
        })
    }
}

impl<P: PersistenceHook> Clone for SessionCache<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            persistence: Arc::clone(&self.persistence),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of cached sessions.
    pub size: usize,

    /// Configured capacity. `size` exceeds it only while every session is in use.
    pub capacity: usize,

    /// Number of sessions being tracked for idle expiry.
    pub idle_tracked: usize,
}
