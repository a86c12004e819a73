//! Configuration for the session cache.

use std::time::Duration;

/// Default maximum number of sessions to hold in memory.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default interval between idle sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the session cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of sessions to cache before LRU eviction.
    pub max_sessions: usize,

    /// Optional idle time after which a cached session is evicted.
    /// Eviction only drops the in-memory copy; the stored document keeps
    /// its own TTL.
    pub idle_ttl: Option<Duration>,

    /// Interval for the background sweep started by `spawn_cleanup`.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_ttl: None,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sessions to cache.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Evict sessions that have been idle for `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
