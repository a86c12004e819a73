//! Storage client abstraction for the replicated key-value backend.
//!
//! ```text
//! StorageClient (trait)    - insert / upsert-with-CAS / get-and-touch / replica read / remove
//!     └── MemoryBucket     - in-process bucket with one replica, for tests and local use
//! ```
//!
//! All calls are blocking. Timeouts, transport and authentication belong to
//! the concrete client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::record::Cas;

/// Errors reported by a storage client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Create-if-absent found an existing document.
    #[error("document already exists: {0}")]
    KeyExists(String),

    /// The supplied concurrency token does not match the stored revision.
    #[error("concurrency token mismatch for {key}: expected {expected}")]
    CasMismatch { key: String, expected: Cas },

    /// The node owning the document could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Whether this error means another writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::KeyExists(_) | StorageError::CasMismatch { .. }
        )
    }
}

/// Result type for storage client operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A raw JSON document together with its revision token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub cas: Cas,
}

/// Key-value operations the session store needs from the backend.
///
/// An `expiry` of zero means the document never expires.
pub trait StorageClient: Send + Sync {
    /// Create a document, failing with [`StorageError::KeyExists`] if the key is taken.
    fn insert(&self, key: &str, expiry: Duration, content: &str) -> StorageResult<Cas>;

    /// Replace a document if its current token equals `cas`.
    ///
    /// Fails with [`StorageError::CasMismatch`] on a stale token and
    /// [`StorageError::NotFound`] if the document is gone.
    fn upsert(&self, key: &str, expiry: Duration, content: &str, cas: Cas) -> StorageResult<Cas>;

    /// Read a document from the primary and reset its expiry.
    fn get_and_touch(&self, key: &str, expiry: Duration) -> StorageResult<Option<Document>>;

    /// Read a document from the first available replica. Never touches expiry.
    fn get_from_replica(&self, key: &str) -> StorageResult<Option<Document>>;

    /// Remove a document unconditionally.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    content: String,
    cas: Cas,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(content: &str, cas: Cas, expiry: Duration) -> Self {
        Self {
            content: content.to_string(),
            cas,
            expires_at: deadline(expiry),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn document(&self) -> Document {
        Document {
            content: self.content.clone(),
            cas: self.cas,
        }
    }
}

fn deadline(expiry: Duration) -> Option<Instant> {
    if expiry.is_zero() {
        None
    } else {
        Some(Instant::now() + expiry)
    }
}

/// In-memory bucket with a single replica.
///
/// Writes are mirrored to the replica unless replication is paused. The
/// primary can be taken offline to exercise failover reads, in which case
/// every primary operation fails with [`StorageError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryBucket {
    primary: Mutex<HashMap<String, Entry>>,
    replica: Mutex<HashMap<String, Entry>>,
    last_cas: AtomicU64,
    primary_offline: AtomicBool,
    replication_paused: AtomicBool,
    inserts: AtomicUsize,
    upserts: AtomicUsize,
    replica_reads: AtomicUsize,
}

impl MemoryBucket {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the primary offline (`false`) or bring it back (`true`).
    pub fn set_primary_available(&self, available: bool) {
        self.primary_offline.store(!available, Ordering::SeqCst);
    }

    /// Stop or resume mirroring writes to the replica.
    pub fn set_replication_paused(&self, paused: bool) {
        self.replication_paused.store(paused, Ordering::SeqCst);
    }

    /// Place a document directly on the replica.
    pub fn seed_replica(&self, key: &str, content: &str, cas: Cas) {
        self.replica
            .lock()
            .insert(key.to_string(), Entry::new(content, cas, Duration::ZERO));
    }

    /// Peek at the primary copy without touching its expiry.
    pub fn document(&self, key: &str) -> Option<Document> {
        let now = Instant::now();
        self.primary
            .lock()
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(Entry::document)
    }

    /// Peek at the replica copy.
    pub fn replica_document(&self, key: &str) -> Option<Document> {
        let now = Instant::now();
        self.replica
            .lock()
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(Entry::document)
    }

    /// Number of live documents on the primary.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.primary
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful inserts so far.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Number of successful upserts so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Number of replica reads attempted so far.
    pub fn replica_read_count(&self) -> usize {
        self.replica_reads.load(Ordering::SeqCst)
    }

    fn next_cas(&self) -> Cas {
        Cas(self.last_cas.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_primary(&self, key: &str) -> StorageResult<()> {
        if self.primary_offline.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(format!(
                "primary node for {key} is offline"
            )))
        } else {
            Ok(())
        }
    }

    fn replicate(&self, key: &str, entry: Option<&Entry>) {
        if self.replication_paused.load(Ordering::SeqCst) {
            return;
        }
        let mut replica = self.replica.lock();
        match entry {
            Some(entry) => {
                replica.insert(key.to_string(), entry.clone());
            }
            None => {
                replica.remove(key);
            }
        }
    }
}

impl StorageClient for MemoryBucket {
    fn insert(&self, key: &str, expiry: Duration, content: &str) -> StorageResult<Cas> {
        self.check_primary(key)?;
        let mut primary = self.primary.lock();

        if primary
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()))
        {
            return Err(StorageError::KeyExists(key.to_string()));
        }

        let cas = self.next_cas();
        let entry = Entry::new(content, cas, expiry);
        self.replicate(key, Some(&entry));
        primary.insert(key.to_string(), entry);
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(cas)
    }

    fn upsert(&self, key: &str, expiry: Duration, content: &str, cas: Cas) -> StorageResult<Cas> {
        self.check_primary(key)?;
        let mut primary = self.primary.lock();

        let current = match primary.get(key) {
            Some(e) if !e.is_expired(Instant::now()) => e.cas,
            _ => return Err(StorageError::NotFound(key.to_string())),
        };
        if current != cas {
            return Err(StorageError::CasMismatch {
                key: key.to_string(),
                expected: cas,
            });
        }

        let next = self.next_cas();
        let entry = Entry::new(content, next, expiry);
        self.replicate(key, Some(&entry));
        primary.insert(key.to_string(), entry);
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(next)
    }

    fn get_and_touch(&self, key: &str, expiry: Duration) -> StorageResult<Option<Document>> {
        self.check_primary(key)?;
        let mut primary = self.primary.lock();
        let now = Instant::now();

        if primary.get(key).is_some_and(|e| e.is_expired(now)) {
            primary.remove(key);
            return Ok(None);
        }

        Ok(primary.get_mut(key).map(|e| {
            e.expires_at = deadline(expiry);
            e.document()
        }))
    }

    fn get_from_replica(&self, key: &str) -> StorageResult<Option<Document>> {
        self.replica_reads.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        Ok(self
            .replica
            .lock()
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(Entry::document))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_primary(key)?;
        let mut primary = self.primary.lock();

        match primary.remove(key) {
            Some(e) if !e.is_expired(Instant::now()) => {
                self.replicate(key, None);
                Ok(())
            }
            _ => Err(StorageError::NotFound(key.to_string())),
        }
    }
}
