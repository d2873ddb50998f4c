use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::version::VersionNumber;

// =============================================================================
// Registry constants
// =============================================================================

/// Default registry to read packages from
pub const DEFAULT_REGISTRY_URL: &str = "https://package.openupm.com";

/// Substring identifying this registry among the manifest's scoped registries
pub const DEFAULT_SCOPE_MATCH: &str = "package.openupm.com";

/// Page size of the registry-wide search, large enough to list every package
pub const SEARCH_PAGE_SIZE: u32 = 100_000;

// =============================================================================
// Cache constants
// =============================================================================

/// Number of concurrent workers for cache loading and package fetching
pub const DEFAULT_WORKER_COUNT: usize = 16;

/// Bumped whenever the cached record format changes, so stale entries are refetched
pub const CACHE_SCHEMA_VERSION: u32 = 7;

const APP_DIR_NAME: &str = "package-catalog";

/// Log file written in the data directory
pub const LOG_FILE_NAME: &str = "package-catalog.log";

/// Catalog configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub host: HostConfig,
}

/// Remote registry configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    pub url: String,
    /// Matched against the `url` of each scoped registry in the manifest
    pub scope_match: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            scope_match: DEFAULT_SCOPE_MATCH.to_string(),
        }
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub worker_count: usize,
    /// Overrides the cache directory under the data directory
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            directory: None,
        }
    }
}

impl CacheConfig {
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(cache_dir)
    }
}

/// Host project configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    /// Overrides the engine version read from the project
    pub engine_version: Option<VersionNumber>,
}

impl CatalogConfig {
    /// Load the configuration from `path`, or the defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the path to the data directory for package-catalog.
/// Uses $XDG_DATA_HOME/package-catalog if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/package-catalog,
/// or ./package-catalog if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the default path of the configuration file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Returns the default per-package cache directory.
pub fn cache_dir() -> PathBuf {
    data_dir().join("net-cache")
}

/// Returns the path to the install history database.
pub fn history_path() -> PathBuf {
    data_dir().join("install-history.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_DIR_NAME)
}
