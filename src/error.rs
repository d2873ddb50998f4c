use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("Version '{version}' has an unexpected character '{found}'")]
    UnexpectedCharacter { version: String, found: char },

    #[error("Version '{0}' has a component that does not fit in 32 bits")]
    Overflow(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed cache entry {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Package name '{0}' cannot be used as a cache file name")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Engine version could not be determined: {0}")]
    EngineVersion(String),

    #[error("Host inventory request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to access manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not find scoped registries in the manifest, is the registry configured?")]
    MissingScopedRegistries,

    #[error("Could not find a scoped registry whose url contains '{0}'")]
    RegistryNotFound(String),

    #[error("Scoped registry '{0}' has no scopes list")]
    MissingScopes(String),

    #[error("Package manifest {path:?} has no name")]
    MissingPackageName { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Install history uses schema v{found}, newer than the supported v{supported}")]
    UnsupportedSchema { found: i32, supported: i32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a whole synchronization cycle
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to query installed packages: {0}")]
    Host(#[from] HostError),

    #[error("Failed to load the package cache: {0}")]
    Cache(#[from] CacheError),

    #[error("Synchronization was interrupted")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Sync(#[from] Arc<SyncError>),

    #[error("Package not found in catalog: {0}")]
    PackageNotFound(String),

    #[error("Version {version} of {package} not found in catalog")]
    VersionNotFound { package: String, version: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Host(#[from] HostError),
}
