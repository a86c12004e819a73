//! Web session persistence over a replicated key-value store.
//!
//! [`SessionManager`] is the entry point for request handling: it serves one
//! shared record per session id from memory, grants write access per
//! request, and flushes records through [`SessionStore`] when requests
//! complete or records are evicted.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvsession::{MemoryBucket, SessionAccess, SessionManager, load_config};
//!
//! let loaded = load_config(None)?;
//! let manager = SessionManager::from_config(Arc::new(MemoryBucket::new()), &loaded.config);
//!
//! let session = manager.session("abc", SessionAccess::READ_WRITE).await?.unwrap();
//! session.write().set_attribute("cart", serde_json::json!(["x"]))?;
//! manager.complete("abc").await?;
//! ```

mod access;
mod error;
mod manager;
mod persistence;

pub use access::SessionAccess;
pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use persistence::{SharedSession, StorePersistence};

pub use kvsession_cache::{CacheConfig, CacheStats};
pub use kvsession_config::{KvSessionConfig, LoadedConfig, load_config, load_config_with_options};
pub use kvsession_store::{
    Cas, Document, MemoryBucket, SessionRecord, SessionStore, StorageClient, StorageError,
    StorageResult, StoreConfig, WriteNotPermitted, codec, now_millis,
};
pub use serde_json::Value;
