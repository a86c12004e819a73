//! Locating, layering and persisting session config files.
//!
//! Two layers are read, the second overriding the first section by section:
//! 1. [`ConfigLayer::User`]: `config.toml` in `KVSESSION_CONFIG_DIR`, else
//!    in the platform config dir under `kvsession/`
//! 2. [`ConfigLayer::Project`]: `kvsession.toml` in the project directory

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::KvSessionConfig;

const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "kvsession.toml";
const APP_DIR: &str = "kvsession";
const CONFIG_DIR_ENV: &str = "KVSESSION_CONFIG_DIR";

/// Which layer a config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    User,
    Project,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLayer::User => f.write_str("user"),
            ConfigLayer::Project => f.write_str("project"),
        }
    }
}

/// One file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    /// False if the file was absent or could not be parsed.
    pub loaded: bool,
}

/// The merged config plus an account of how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: KvSessionConfig,
    /// Files examined, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Unreadable layers and validation warnings.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the files that contributed to the merged config.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|s| s.loaded.then_some(s.path.as_path()))
            .collect()
    }
}

/// Discover and merge config for `project_dir` (the working directory if `None`).
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], reading the user layer from `config_dir` when given.
///
/// A layer that cannot be read or parsed is skipped and reported in
/// `warnings`. A merged config that fails validation is an error.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user = config_dir
        .map(|dir| dir.join(USER_FILE))
        .or_else(config_path);
    let project = project_dir.unwrap_or(Path::new(".")).join(PROJECT_FILE);

    let candidates = user
        .map(|path| (ConfigLayer::User, path))
        .into_iter()
        .chain([(ConfigLayer::Project, project)]);

    let mut loaded = LoadedConfig {
        config: KvSessionConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    for (layer, path) in candidates {
        let mut ok = false;
        if path.is_file() {
            match load_config_file(&path) {
                Ok(overlay) => {
                    loaded.config.merge(overlay);
                    ok = true;
                }
                Err(e) => loaded
                    .warnings
                    .push(format!("Ignoring {layer} config {}: {e}", path.display())),
            }
        }
        loaded.sources.push(ConfigSource {
            layer,
            path,
            loaded: ok,
        });
    }

    let validation = loaded.config.validate()?;
    loaded.warnings.extend(validation);
    Ok(loaded)
}

/// Read and parse a single config file.
pub fn load_config_file(path: &Path) -> Result<KvSessionConfig> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::io("read", path, e))?;
    KvSessionConfig::from_toml(&text)
}

/// Write `config` to `path`, creating missing parent directories.
pub fn save_config(config: &KvSessionConfig, path: &Path) -> Result<()> {
    let text = config.to_toml()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ConfigError::io("create directory for", path, e))?;
    }
    fs::write(path, text).map_err(|e| ConfigError::io("write", path, e))
}

/// Location of the user-layer config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(USER_FILE))
}

/// User config directory: `KVSESSION_CONFIG_DIR` when set and non-empty,
/// otherwise `kvsession/` under the platform config dir.
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|dir| dir.join(APP_DIR)),
    }
}
