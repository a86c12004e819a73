//! Configuration system for kvsession.
//!
//! Provides TOML-based configuration with:
//! - `[store]`: key prefix, storage TTL, context path and virtual host
//! - `[cache]`: in-memory capacity and idle expiry
//! - Config file layering (user config dir + project-local override)
//! - Capability traits so consumers need not know the file layout

pub mod discovery;
pub mod error;
pub mod provider;
pub mod types;

pub use discovery::{
    ConfigLayer, ConfigSource, LoadedConfig, config_dir, config_path, load_config, load_config_file,
    load_config_with_options, save_config,
};
pub use error::{ConfigError, Result};
pub use provider::{ConfigProvider, HasCacheConfig, HasStoreConfig, defaults};
pub use types::{CacheSection, KvSessionConfig, StoreSection};
