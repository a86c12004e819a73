//! In-memory session cache with LRU eviction and idle expiry.
//!
//! This crate provides a generic caching layer for sessions with:
//! - LRU eviction to prevent unbounded memory growth
//! - Optional idle expiry for sessions nobody is using
//! - Persistence hooks for loading, saving and passivating sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use kvsession_cache::{CacheConfig, SessionCache};
//!
//! let config = CacheConfig::default()
//!     .with_max_sessions(1000)
//!     .with_idle_ttl(Duration::from_secs(300));
//!
//! let cache = SessionCache::with_persistence(config, hook);
//! ```

mod cache;
mod config;
mod error;
mod idle;
mod persistence;

pub use cache::{CacheStats, SessionCache};
pub use config::{CacheConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_SESSIONS};
pub use error::{BoxError, Error, Result};
pub use idle::IdleTracker;
pub use persistence::PersistenceHook;
