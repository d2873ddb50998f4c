//! Device-wide on-disk cache with one JSON file per package
//!
//! Each file wraps a [`PackageRecord`] with the schema version it was written
//! with. Entries written with a different schema version are ignored, so a
//! format change forces the packages to be fetched again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::progress::{SyncPhase, SyncProgress};
use crate::catalog::record::PackageRecord;
use crate::catalog::refresh::{WorkQueue, join_workers};
use crate::config::CACHE_SCHEMA_VERSION;
use crate::error::{CacheError, SyncError};

const SCHEMA_KEY: &str = "schemaVersion";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntryRef<'a> {
    schema_version: u32,
    record: &'a PackageRecord,
}

#[derive(Deserialize)]
struct CacheEntry {
    record: PackageRecord,
}

pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a package is cached in. Names that could escape the cache
    /// directory are rejected.
    fn entry_path(&self, package_name: &str) -> Result<PathBuf, CacheError> {
        let is_safe = !package_name.is_empty()
            && !package_name.starts_with('.')
            && !package_name.contains(['/', '\\', ':'])
            && !package_name.contains("..");
        if !is_safe {
            return Err(CacheError::InvalidName(package_name.to_string()));
        }
        Ok(self.dir.join(format!("{package_name}.json")))
    }

    /// Write a record, replacing any previous entry for the package
    pub fn store(&self, record: &PackageRecord) -> Result<(), CacheError> {
        let path = self.entry_path(record.name())?;
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let entry = CacheEntryRef {
            schema_version: CACHE_SCHEMA_VERSION,
            record,
        };
        let json = serde_json::to_string_pretty(&entry).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| CacheError::Io { path, source })
    }

    /// Read one cache file. `Ok(None)` means the entry has another schema version.
    pub fn read_entry(path: &Path) -> Result<Option<PackageRecord>, CacheError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        // Check the tag before decoding the record; old formats may not decode at all
        let schema_version = value.get(SCHEMA_KEY).and_then(Value::as_u64);
        if schema_version != Some(u64::from(CACHE_SCHEMA_VERSION)) {
            debug!(
                "Ignoring cache entry {:?} with schema version {:?}",
                path, schema_version
            );
            return Ok(None);
        }

        let entry: CacheEntry = serde_json::from_value(value).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(entry.record))
    }

    fn list_entries(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| CacheError::Io {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Load every current-schema entry, spreading the files over the workers.
    ///
    /// Unreadable or corrupt files are skipped like a schema mismatch.
    pub async fn load_all(
        &self,
        worker_count: usize,
        progress: Arc<SyncProgress>,
    ) -> Result<HashMap<String, PackageRecord>, SyncError> {
        let files = self.list_entries()?;
        progress.begin(SyncPhase::LoadingCache, files.len());

        let queue = WorkQueue::new(files);
        let handles = (0..worker_count.max(1))
            .map(|_| {
                let queue = Arc::clone(&queue);
                let progress = Arc::clone(&progress);
                tokio::task::spawn_blocking(move || {
                    let mut loaded = Vec::new();
                    while let Some(path) = queue.next() {
                        match Self::read_entry(&path) {
                            Ok(Some(record)) => loaded.push(record),
                            Ok(None) => {}
                            Err(e) => warn!("Skipping unreadable cache entry: {}", e),
                        }
                        progress.advance();
                    }
                    loaded
                })
            })
            .collect();

        let records: HashMap<String, PackageRecord> = join_workers(handles)
            .await?
            .into_iter()
            .flatten()
            .map(|record| (record.name().to_string(), record))
            .collect();

        debug!("Loaded {} packages from cache {:?}", records.len(), self.dir);
        Ok(records)
    }
}
