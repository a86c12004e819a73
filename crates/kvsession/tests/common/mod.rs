//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use kvsession::{CacheConfig, MemoryBucket, SessionManager, SessionStore, StoreConfig};

pub const KEY_PREFIX: &str = "test::app::session::";

/// A store over an in-memory bucket, with the bucket kept for inspection.
pub struct TestBackend {
    pub bucket: Arc<MemoryBucket>,
    pub store: Arc<SessionStore<MemoryBucket>>,
}

impl TestBackend {
    pub fn new() -> Self {
        let bucket = Arc::new(MemoryBucket::new());
        let store = Arc::new(SessionStore::new(
            Arc::clone(&bucket),
            StoreConfig::new(KEY_PREFIX),
        ));
        Self { bucket, store }
    }

    pub fn manager(&self, cache: CacheConfig) -> SessionManager<MemoryBucket> {
        SessionManager::new(Arc::clone(&self.store), cache)
    }

    pub fn key(&self, id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }
}
