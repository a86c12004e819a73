//! Session store: load, store and delete against a [`StorageClient`].
//!
//! Documents live under `key_prefix + session_id`. Reads refresh the
//! document's expiry, since reading a session is itself activity. When the
//! primary cannot be read the store falls back once to a replica. Writes
//! are never retried: a conflict always reaches the caller.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::record::{SessionRecord, check_writable, now_millis};
use crate::storage::{Document, StorageClient};

/// Default inactivity interval: 30 minutes.
pub const DEFAULT_MAX_INACTIVE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Configuration for a [`SessionStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prepended to every session id to form the storage key,
    /// e.g. `dev::app::session::`.
    pub key_prefix: String,

    /// Storage TTL, refreshed on every read and write.
    pub max_inactive_interval: Duration,

    /// Context path stamped on newly created sessions.
    pub context_path: String,

    /// Virtual host stamped on newly created sessions.
    pub virtual_host: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            max_inactive_interval: DEFAULT_MAX_INACTIVE_INTERVAL,
            context_path: "/".to_string(),
            virtual_host: "0.0.0.0".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration with the given key prefix and defaults elsewhere.
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            ..Self::default()
        }
    }

    /// Set the storage TTL / inactivity interval.
    pub fn with_max_inactive_interval(mut self, interval: Duration) -> Self {
        self.max_inactive_interval = interval;
        self
    }

    /// Set the context path and virtual host for new sessions.
    pub fn with_context(
        mut self,
        context_path: impl Into<String>,
        virtual_host: impl Into<String>,
    ) -> Self {
        self.context_path = context_path.into();
        self.virtual_host = virtual_host.into();
        self
    }
}

/// Persists [`SessionRecord`]s to a replicated key-value store.
///
/// The store keeps no per-session state. Conflicts between concurrent
/// writers of one session are detected by the backend's create-if-absent
/// and CAS primitives; the store only reports them.
pub struct SessionStore<S: StorageClient + ?Sized> {
    client: Arc<S>,
    config: StoreConfig,
    running: AtomicBool,
}

impl<S: StorageClient + ?Sized> SessionStore<S> {
    /// Create a running store over `client`.
    pub fn new(client: Arc<S>, config: StoreConfig) -> Self {
        Self {
            client,
            config,
            running: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<S> {
        &self.client
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Stop accepting stores. Loads and deletes still work.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Records are serialized whenever they leave memory.
    pub fn is_passivating(&self) -> bool {
        true
    }

    /// Storage key for a session id.
    pub fn key(&self, id: &str) -> String {
        format!("{}{}", self.config.key_prefix, id)
    }

    /// Construct a record for a session that has no backing document yet.
    pub fn new_session(
        &self,
        id: &str,
        created: i64,
        accessed: i64,
        last_accessed: i64,
        max_inactive_ms: i64,
    ) -> SessionRecord {
        SessionRecord::new(
            id,
            self.config.context_path.as_str(),
            self.config.virtual_host.as_str(),
            created,
            accessed,
            last_accessed,
            max_inactive_ms,
        )
    }

    /// Load a session, refreshing its expiry.
    ///
    /// Returns `Ok(None)` when the document does not exist. If the primary
    /// read fails for any other reason the first replica is read instead.
    /// A document that cannot be decoded is always an error.
    pub fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        let key = self.key(id);
        debug!(key = %key, "Loading session");

        match self
            .client
            .get_and_touch(&key, self.config.max_inactive_interval)
        {
            Ok(Some(doc)) => decode(&key, doc).map(Some),
            Ok(None) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                warn!(key = %key, error = %e, "Read from primary failed, attempting read from replica");

                match self.client.get_from_replica(&key) {
                    Ok(Some(doc)) => decode(&key, doc).map(Some),
                    Ok(None) => Ok(None),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(Error::from_storage(&key, e)),
                }
            }
        }
    }

    /// Whether a document exists for `id`. Refreshes its expiry like [`load`](Self::load).
    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.load(id)?.is_some())
    }

    /// Persist a record.
    ///
    /// With `is_first_save` the document is created and the call fails with
    /// [`Error::Conflict`] if the key already exists. Otherwise the record
    /// must be writable; `last_saved` is stamped and the document replaced
    /// under the record's concurrency token. On success the record holds the
    /// token of the revision just written.
    ///
    /// Does nothing while the store is stopped.
    pub fn store(&self, id: &str, record: &mut SessionRecord, is_first_save: bool) -> Result<()> {
        if !self.is_running() {
            debug!(session_id = %id, "Store not running, skipping save");
            return Ok(());
        }

        let key = self.key(id);
        let ttl = self.config.max_inactive_interval;
        debug!(key = %key, first_save = is_first_save, session = %record, "Storing session");

        if is_first_save {
            let content = codec::serialize(record).map_err(|source| Error::Serialize {
                key: key.clone(),
                source,
            })?;
            let cas = self
                .client
                .insert(&key, ttl, &content)
                .map_err(|e| Error::from_storage(&key, e))?;
            record.set_cas(Some(cas));
        } else {
            check_writable(record, "store")?;
            let cas = record
                .cas()
                .ok_or_else(|| Error::MissingToken { key: key.clone() })?;

            let previous = record.last_saved();
            record.set_last_saved(now_millis());

            let written = codec::serialize(record)
                .map_err(|source| Error::Serialize {
                    key: key.clone(),
                    source,
                })
                .and_then(|content| {
                    self.client
                        .upsert(&key, ttl, &content, cas)
                        .map_err(|e| Error::from_storage(&key, e))
                });

            match written {
                Ok(next) => record.set_cas(Some(next)),
                Err(e) => {
                    record.set_last_saved(previous);
                    return Err(e);
                }
            }
        }

        debug!(key = %key, cas = ?record.cas(), "Stored session");
        Ok(())
    }

    /// Persist a record, creating the document if the record has never been stored or loaded.
    pub fn save(&self, id: &str, record: &mut SessionRecord) -> Result<()> {
        let first = record.is_new();
        self.store(id, record, first)
    }

    /// Remove a session document.
    ///
    /// Returns `true` only if a document was removed. The concurrency token
    /// is ignored: a writer racing a delete fails on its own
    /// because the key is gone. Failures are logged, never returned.
    pub fn delete(&self, id: &str) -> bool {
        let key = self.key(id);
        debug!(key = %key, "Deleting session");

        match self.client.remove(&key) {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "Session to delete did not exist");
                false
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete session");
                false
            }
        }
    }

    /// The backend expires documents itself, so every candidate counts as expired here.
    pub fn get_expired(&self, candidates: HashSet<String>) -> HashSet<String> {
        candidates
    }
}

fn decode(key: &str, doc: Document) -> Result<SessionRecord> {
    codec::deserialize(&doc.content, doc.cas).map_err(|source| Error::Deserialize {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Cas;
    use crate::storage::{MemoryBucket, StorageError, StorageResult};
    use serde_json::json;

    const PREFIX: &str = "test::app::session::";

    fn setup() -> (Arc<MemoryBucket>, SessionStore<MemoryBucket>) {
        let bucket = Arc::new(MemoryBucket::new());
        let config = StoreConfig::new(PREFIX).with_context("/shop", "example.com");
        let store = SessionStore::new(Arc::clone(&bucket), config);
        (bucket, store)
    }

    fn fresh(store: &SessionStore<MemoryBucket>, id: &str) -> SessionRecord {
        let now = now_millis();
        store.new_session(id, now, now, now, 1_800_000)
    }

    #[test]
    fn test_key_prefix() {
        let (_, store) = setup();
        assert_eq!(store.key("abc"), "test::app::session::abc");
    }

    #[test]
    fn test_new_session_uses_context() {
        let (_, store) = setup();
        let record = fresh(&store, "abc");

        assert_eq!(record.context_path(), "/shop");
        assert_eq!(record.virtual_host(), "example.com");
        assert!(record.is_new());
    }

    #[test]
    fn test_load_missing() {
        let (bucket, store) = setup();

        assert!(store.load("abc").unwrap().is_none());
        assert!(!store.exists("abc").unwrap());
        assert_eq!(bucket.replica_read_count(), 0);
    }

    #[test]
    fn test_first_save_inserts() {
        let (bucket, store) = setup();
        let mut record = fresh(&store, "abc");

        store.store("abc", &mut record, true).unwrap();

        assert_eq!(bucket.insert_count(), 1);
        assert_eq!(record.last_saved(), 0);
        let doc = bucket.document("test::app::session::abc").unwrap();
        assert_eq!(record.cas(), Some(doc.cas));
    }

    #[test]
    fn test_first_save_duplicate_id_conflicts() {
        let (_, store) = setup();
        let mut first = fresh(&store, "abc");
        let mut second = fresh(&store, "abc");

        store.store("abc", &mut first, true).unwrap();
        let err = store.store("abc", &mut second, true).unwrap_err();

        assert!(matches!(
            err,
            Error::Conflict {
                source: StorageError::KeyExists(_),
                ..
            }
        ));
    }

    #[test]
    fn test_save_inserts_once_then_upserts() {
        let (bucket, store) = setup();
        let mut record = fresh(&store, "abc");
        record.set_writable(true);

        store.save("abc", &mut record).unwrap();
        store.save("abc", &mut record).unwrap();
        store.save("abc", &mut record).unwrap();

        assert_eq!(bucket.insert_count(), 1);
        assert_eq!(bucket.upsert_count(), 2);
        assert!(record.last_saved() > 0);
    }

    #[test]
    fn test_update_requires_write_grant() {
        let (bucket, store) = setup();
        let mut record = fresh(&store, "abc");
        store.save("abc", &mut record).unwrap();

        let err = store.store("abc", &mut record, false).unwrap_err();

        assert!(matches!(err, Error::WriteNotPermitted(_)));
        assert_eq!(record.last_saved(), 0);
        assert_eq!(bucket.upsert_count(), 0);
    }

    #[test]
    fn test_update_without_token() {
        let (_, store) = setup();
        let mut record = fresh(&store, "abc");
        record.set_writable(true);

        let err = store.store("abc", &mut record, false).unwrap_err();
        assert!(matches!(err, Error::MissingToken { .. }));
    }

    #[test]
    fn test_load_round_trip() {
        let (_, store) = setup();
        let mut record = fresh(&store, "abc");
        record.set_writable(true);
        record.set_attribute("cart", json!(["x"])).unwrap();
        store.save("abc", &mut record).unwrap();

        let loaded = store.load("abc").unwrap().unwrap();

        assert_eq!(loaded.id(), "abc");
        assert_eq!(loaded.attribute("cart"), Some(&json!(["x"])));
        assert_eq!(loaded.context_path(), "/shop");
        assert_eq!(loaded.cas(), record.cas());
        assert!(!loaded.is_writable());
    }

    #[test]
    fn test_stale_token_conflicts_and_leaves_document() {
        let (bucket, store) = setup();
        let mut record = fresh(&store, "abc");
        store.save("abc", &mut record).unwrap();

        let mut winner = store.load("abc").unwrap().unwrap();
        let mut loser = winner.clone();
        winner.set_writable(true);
        loser.set_writable(true);

        winner.set_attribute("who", "winner").unwrap();
        store.save("abc", &mut winner).unwrap();
        let committed = bucket.document("test::app::session::abc").unwrap();

        loser.set_attribute("who", "loser").unwrap();
        let err = store.save("abc", &mut loser).unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(loser.last_saved(), 0);
        assert_eq!(bucket.document("test::app::session::abc"), Some(committed));
    }

    #[test]
    fn test_load_falls_back_to_replica() {
        let (bucket, store) = setup();
        let mut record = fresh(&store, "abc");
        store.save("abc", &mut record).unwrap();

        let content = bucket.document("test::app::session::abc").unwrap().content;
        bucket.seed_replica("test::app::session::abc", &content, Cas(999));
        bucket.set_primary_available(false);

        let loaded = store.load("abc").unwrap().unwrap();
        assert_eq!(loaded.cas(), Some(Cas(999)));
        assert_eq!(bucket.replica_read_count(), 1);
    }

    #[test]
    fn test_replica_missing_is_absent() {
        let (bucket, store) = setup();
        bucket.set_primary_available(false);

        assert!(store.load("abc").unwrap().is_none());
        assert_eq!(bucket.replica_read_count(), 1);
    }

    #[test]
    fn test_corrupt_document_is_error() {
        let (bucket, store) = setup();
        bucket
            .insert("test::app::session::abc", Duration::ZERO, "{\"garbage\":")
            .unwrap();

        let err = store.load("abc").unwrap_err();
        assert!(matches!(err, Error::Deserialize { .. }));
        assert_eq!(bucket.replica_read_count(), 0);
    }

    #[test]
    fn test_corrupt_replica_document_is_error() {
        let (bucket, store) = setup();
        bucket.seed_replica("test::app::session::abc", "[]", Cas(3));
        bucket.set_primary_available(false);

        let err = store.load("abc").unwrap_err();
        assert!(matches!(err, Error::Deserialize { .. }));
    }

    #[test]
    fn test_delete() {
        let (_, store) = setup();
        let mut record = fresh(&store, "abc");
        store.save("abc", &mut record).unwrap();

        assert!(store.delete("abc"));
        assert!(store.load("abc").unwrap().is_none());
        assert!(!store.delete("abc"));
    }

    #[test]
    fn test_delete_swallows_backend_failure() {
        let (bucket, store) = setup();
        let mut record = fresh(&store, "abc");
        store.save("abc", &mut record).unwrap();
        bucket.set_primary_available(false);

        assert!(!store.delete("abc"));
    }

    #[test]
    fn test_stopped_store_skips_writes() {
        let (bucket, store) = setup();
        store.stop();
        let mut record = fresh(&store, "abc");

        store.save("abc", &mut record).unwrap();
        assert!(bucket.is_empty());
        assert!(record.is_new());

        store.start();
        store.save("abc", &mut record).unwrap();
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_get_expired_returns_candidates() {
        let (_, store) = setup();
        let candidates: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();

        assert_eq!(store.get_expired(candidates.clone()), candidates);
        assert!(store.is_passivating());
    }

    struct UnreachableClient;

    impl StorageClient for UnreachableClient {
        fn insert(&self, key: &str, _: Duration, _: &str) -> StorageResult<Cas> {
            Err(StorageError::Unavailable(key.to_string()))
        }

        fn upsert(&self, key: &str, _: Duration, _: &str, _: Cas) -> StorageResult<Cas> {
            Err(StorageError::Unavailable(key.to_string()))
        }

        fn get_and_touch(&self, key: &str, _: Duration) -> StorageResult<Option<Document>> {
            Err(StorageError::Unavailable(key.to_string()))
        }

        fn get_from_replica(&self, key: &str) -> StorageResult<Option<Document>> {
            Err(StorageError::Other(format!("no replica for {key}")))
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            Err(StorageError::Other(key.to_string()))
        }
    }

    #[test]
    fn test_unreachable_backend() {
        let client: Arc<dyn StorageClient> = Arc::new(UnreachableClient);
        let store = SessionStore::new(client, StoreConfig::new(PREFIX));

        assert!(matches!(store.load("abc"), Err(Error::Storage { .. })));
        assert!(!store.delete("abc"));

        let now = now_millis();
        let mut record = store.new_session("abc", now, now, now, 1_000);
        let err = store.save("abc", &mut record).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        assert!(record.is_new());
    }

    fn short_lived() -> (Arc<MemoryBucket>, SessionStore<MemoryBucket>) {
        let bucket = Arc::new(MemoryBucket::new());
        let config =
            StoreConfig::new(PREFIX).with_max_inactive_interval(Duration::from_millis(200));
        let store = SessionStore::new(Arc::clone(&bucket), config);
        (bucket, store)
    }

    #[test]
    fn test_loads_keep_document_alive() {
        let (_, store) = short_lived();
        let mut record = fresh(&store, "abc");
        store.store("abc", &mut record, true).unwrap();

        // Each load lands inside the window opened by the previous access.
        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(120));
            assert!(store.load("abc").unwrap().is_some());
        }

        std::thread::sleep(Duration::from_millis(300));
        assert!(store.load("abc").unwrap().is_none());
    }

    #[test]
    fn test_replica_read_does_not_extend_expiry() {
        let (bucket, store) = short_lived();
        let mut record = fresh(&store, "abc");
        store.store("abc", &mut record, true).unwrap();
        bucket.set_primary_available(false);

        std::thread::sleep(Duration::from_millis(120));
        assert!(store.load("abc").unwrap().is_some());

        std::thread::sleep(Duration::from_millis(120));
        assert!(store.load("abc").unwrap().is_none());
        assert_eq!(bucket.replica_read_count(), 2);
    }
}
