//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [store]
//! key_prefix = "dev::app::session::"
//! max_inactive_interval_secs = 1800
//! context_path = "/"
//! virtual_host = "0.0.0.0"
//!
//! [cache]
//! max_sessions = 10000
//! cleanup_interval_secs = 60
//! idle_ttl_secs = 300
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::provider::defaults;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvSessionConfig {
    /// Session store configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSection>,

    /// In-memory cache configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,
}

impl KvSessionConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: KvSessionConfig) {
        if other.store.is_some() {
            self.store = other.store;
        }

        if other.cache.is_some() {
            self.cache = other.cache;
        }
    }

    /// Check the config for unusable values.
    ///
    /// Hard errors are returned as `Err`; questionable but workable values
    /// come back as warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if let Some(ref store) = self.store {
            if store.max_inactive_interval_secs == 0 {
                return Err(ConfigError::invalid(
                    "store.max_inactive_interval_secs",
                    "must be at least one second",
                ));
            }
            if store.key_prefix.is_empty() {
                warnings.push(
                    "[store] key_prefix is empty; session documents will share the \
                     bucket namespace with everything else"
                        .to_string(),
                );
            }
        }

        if let Some(ref cache) = self.cache {
            if cache.max_sessions == 0 {
                return Err(ConfigError::invalid(
                    "cache.max_sessions",
                    "the cache must hold at least one session",
                ));
            }
            if cache.cleanup_interval_secs == 0 {
                return Err(ConfigError::invalid(
                    "cache.cleanup_interval_secs",
                    "the idle sweep needs a non-zero period",
                ));
            }
        }

        Ok(warnings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Session store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Namespace prepended to every session id, e.g. `prod::shop::session::`.
    pub key_prefix: String,
    /// Storage TTL and session inactivity timeout, in seconds.
    pub max_inactive_interval_secs: u64,
    /// Context path stamped on new sessions.
    pub context_path: String,
    /// Virtual host stamped on new sessions.
    pub virtual_host: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            key_prefix: defaults::KEY_PREFIX.to_string(),
            max_inactive_interval_secs: defaults::MAX_INACTIVE_INTERVAL_SECS,
            context_path: defaults::CONTEXT_PATH.to_string(),
            virtual_host: defaults::VIRTUAL_HOST.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory session cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Maximum number of sessions to keep in memory before eviction.
    pub max_sessions: usize,
    /// Interval in seconds between idle sweeps.
    pub cleanup_interval_secs: u64,
    /// Evict sessions idle for this many seconds. Unset keeps them until
    /// capacity forces them out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_ttl_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            cleanup_interval_secs: defaults::CLEANUP_INTERVAL_SECS,
            idle_ttl_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let config = KvSessionConfig::from_toml(
            r#"
[store]
key_prefix = "dev::shop::session::"
max_inactive_interval_secs = 600
context_path = "/shop"
virtual_host = "shop.example.com"

[cache]
max_sessions = 500
cleanup_interval_secs = 30
idle_ttl_secs = 120
"#,
        )
        .unwrap();

        let store = config.store.unwrap();
        assert_eq!(store.key_prefix, "dev::shop::session::");
        assert_eq!(store.max_inactive_interval_secs, 600);
        assert_eq!(store.context_path, "/shop");
        assert_eq!(store.virtual_host, "shop.example.com");

        let cache = config.cache.unwrap();
        assert_eq!(cache.max_sessions, 500);
        assert_eq!(cache.cleanup_interval_secs, 30);
        assert_eq!(cache.idle_ttl_secs, Some(120));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config = KvSessionConfig::from_toml(
            r#"
[store]
key_prefix = "p::"
"#,
        )
        .unwrap();

        let store = config.store.unwrap();
        assert_eq!(store.key_prefix, "p::");
        assert_eq!(
            store.max_inactive_interval_secs,
            defaults::MAX_INACTIVE_INTERVAL_SECS
        );
        assert_eq!(store.context_path, "/");
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_empty_config() {
        let config = KvSessionConfig::from_toml("").unwrap();
        assert_eq!(config, KvSessionConfig::new());
    }

    #[test]
    fn test_parse_error() {
        let err = KvSessionConfig::from_toml("[store\nkey_prefix = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = KvSessionConfig {
            store: Some(StoreSection {
                key_prefix: "x::".to_string(),
                ..StoreSection::default()
            }),
            cache: Some(CacheSection::default()),
        };

        let text = config.to_toml().unwrap();
        assert_eq!(KvSessionConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = KvSessionConfig {
            store: Some(StoreSection::default()),
            cache: Some(CacheSection::default()),
        };
        let overlay = KvSessionConfig {
            store: Some(StoreSection {
                key_prefix: "override::".to_string(),
                ..StoreSection::default()
            }),
            cache: None,
        };

        base.merge(overlay);

        assert_eq!(base.store.unwrap().key_prefix, "override::");
        assert_eq!(base.cache, Some(CacheSection::default()));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = KvSessionConfig {
            store: Some(StoreSection {
                key_prefix: "p::".to_string(),
                max_inactive_interval_secs: 0,
                ..StoreSection::default()
            }),
            cache: None,
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "store.max_inactive_interval_secs"
        ));
    }

    #[test]
    fn test_validate_warns_on_empty_prefix() {
        let config = KvSessionConfig {
            store: Some(StoreSection::default()),
            cache: None,
        };

        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("key_prefix"));
    }
}
