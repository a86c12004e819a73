//! Configuration traits for decoupled config passing between crates.
//!
//! Components depend on a configuration capability rather than on the
//! full file layout. Each trait represents one capability.

use std::time::Duration;

use crate::types::{CacheSection, KvSessionConfig, StoreSection};

/// Base trait for all configuration types.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// Session store configuration.
pub trait HasStoreConfig: ConfigProvider {
    /// Namespace prepended to session ids to form storage keys.
    fn key_prefix(&self) -> &str;

    /// Storage TTL, also the session inactivity timeout.
    fn max_inactive_interval(&self) -> Duration;

    /// Context path stamped on new sessions.
    fn context_path(&self) -> &str {
        defaults::CONTEXT_PATH
    }

    /// Virtual host stamped on new sessions.
    fn virtual_host(&self) -> &str {
        defaults::VIRTUAL_HOST
    }
}

/// In-memory session cache configuration.
pub trait HasCacheConfig: ConfigProvider {
    /// Maximum number of sessions to keep in memory.
    fn max_sessions(&self) -> usize;

    /// Interval between idle sweeps.
    fn cleanup_interval(&self) -> Duration;

    /// Idle time after which a cached session is evicted (None = never).
    fn idle_ttl(&self) -> Option<Duration> {
        None
    }
}

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    pub const KEY_PREFIX: &str = "";
    pub const MAX_INACTIVE_INTERVAL_SECS: u64 = 1800;
    pub const CONTEXT_PATH: &str = "/";
    pub const VIRTUAL_HOST: &str = "0.0.0.0";
    pub const MAX_SESSIONS: usize = 10_000;
    pub const CLEANUP_INTERVAL_SECS: u64 = 60;

    pub fn max_inactive_interval() -> Duration {
        Duration::from_secs(MAX_INACTIVE_INTERVAL_SECS)
    }

    pub fn cleanup_interval() -> Duration {
        Duration::from_secs(CLEANUP_INTERVAL_SECS)
    }
}

impl ConfigProvider for StoreSection {}

impl HasStoreConfig for StoreSection {
    fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn max_inactive_interval(&self) -> Duration {
        Duration::from_secs(self.max_inactive_interval_secs)
    }

    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn virtual_host(&self) -> &str {
        &self.virtual_host
    }
}

impl ConfigProvider for CacheSection {}

impl HasCacheConfig for CacheSection {
    fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl_secs.map(Duration::from_secs)
    }
}

impl ConfigProvider for KvSessionConfig {}

impl HasStoreConfig for KvSessionConfig {
    fn key_prefix(&self) -> &str {
        self.store
            .as_ref()
            .map_or(defaults::KEY_PREFIX, |s| s.key_prefix.as_str())
    }

    fn max_inactive_interval(&self) -> Duration {
        self.store
            .as_ref()
            .map_or_else(defaults::max_inactive_interval, |s| {
                s.max_inactive_interval()
            })
    }

    fn context_path(&self) -> &str {
        self.store
            .as_ref()
            .map_or(defaults::CONTEXT_PATH, |s| s.context_path.as_str())
    }

    fn virtual_host(&self) -> &str {
        self.store
            .as_ref()
            .map_or(defaults::VIRTUAL_HOST, |s| s.virtual_host.as_str())
    }
}

impl HasCacheConfig for KvSessionConfig {
    fn max_sessions(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(defaults::MAX_SESSIONS, |c| c.max_sessions)
    }

    fn cleanup_interval(&self) -> Duration {
        self.cache
            .as_ref()
            .map_or_else(defaults::cleanup_interval, |c| c.cleanup_interval())
    }

    fn idle_ttl(&self) -> Option<Duration> {
        self.cache.as_ref().and_then(|c| c.idle_ttl())
    }
}
