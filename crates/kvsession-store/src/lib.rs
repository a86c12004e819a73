//! Durable session persistence over a replicated key-value store.
//!
//! This crate is the backing layer for an in-memory session cache:
//! - [`SessionRecord`] with a write gate guarding attribute mutation
//! - a flat JSON document format ([`codec`])
//! - a [`StorageClient`] seam with an in-memory [`MemoryBucket`]
//! - [`SessionStore`], which loads with primary-to-replica failover and
//!   stores with create-if-absent on first save and CAS-guarded upserts after
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvsession_store::{MemoryBucket, SessionStore, StoreConfig};
//!
//! let store = SessionStore::new(Arc::new(MemoryBucket::new()), StoreConfig::new("dev::app::session::"));
//! let mut record = store.new_session("abc", now, now, now, 1_800_000);
//! store.save("abc", &mut record)?;
//! ```

pub mod codec;
mod error;
mod record;
mod storage;
mod store;

pub use codec::CodecError;
pub use error::{Error, Result};
pub use record::{
    CONTEXT_PATH_ATTRIBUTE, Cas, SessionRecord, VIRTUAL_HOST_ATTRIBUTE, WriteNotPermitted,
    check_writable, now_millis,
};
pub use storage::{Document, MemoryBucket, StorageClient, StorageError, StorageResult};
pub use store::{DEFAULT_MAX_INACTIVE_INTERVAL, SessionStore, StoreConfig};
