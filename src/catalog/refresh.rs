//! Bounded worker pool and the registry refresh built on it

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::catalog::cache::DiskCache;
use crate::catalog::progress::{SyncPhase, SyncProgress};
use crate::catalog::record::PackageRecord;
use crate::error::{RegistryError, SyncError};
use crate::registry::{IndexEntry, Registry};

/// Queue shared by the workers of one fan-out
pub(crate) struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> WorkQueue<T> {
    pub(crate) fn new(items: impl IntoIterator<Item = T>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items.into_iter().collect()),
        })
    }

    /// Next unit of work, `None` once drained
    pub(crate) fn next(&self) -> Option<T> {
        self.items.lock().ok()?.pop_front()
    }
}

/// Wait for one spawned task.
///
/// A panic is re-raised here; a cancelled task means the runtime is shutting
/// down and ends the cycle.
pub(crate) async fn join_task<R>(handle: JoinHandle<R>) -> Result<R, SyncError> {
    match handle.await {
        Ok(result) => Ok(result),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SyncError::Interrupted),
    }
}

/// Wait for every worker and collect their results in spawn order
pub(crate) async fn join_workers<R>(handles: Vec<JoinHandle<R>>) -> Result<Vec<R>, SyncError> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(join_task(handle).await?);
    }
    Ok(results)
}

/// Names that are missing from the cache or whose cached versions lack the
/// index's latest version.
///
/// Names with uppercase characters can never be installed and are skipped.
pub fn stale_packages(index: &[IndexEntry], cached: &HashMap<String, PackageRecord>) -> Vec<String> {
    index
        .iter()
        .filter(|entry| !entry.name.chars().any(char::is_uppercase))
        .filter(|entry| match cached.get(&entry.name) {
            None => {
                debug!(
                    "Fetching package data for {} because it was not found in cache",
                    entry.name
                );
                true
            }
            Some(record) if !record.has_version(&entry.latest_version) => {
                debug!(
                    "Fetching package data for {} because version {} was not found in cache",
                    entry.name, entry.latest_version
                );
                true
            }
            Some(_) => false,
        })
        .map(|entry| entry.name.clone())
        .collect()
}

/// Fetch and cache a single package's versions.
///
/// Returns the fetched record, or `None` when the fetch failed. Failures are
/// logged and leave the package's previous cache entry in place. The cache
/// write runs on the blocking pool.
async fn fetch_and_cache_package(
    registry: &dyn Registry,
    cache: &Arc<DiskCache>,
    package_name: &str,
) -> Option<PackageRecord> {
    let record = match registry.fetch_package(package_name).await {
        Ok(record) => record,
        Err(RegistryError::NotFound(_)) => {
            info!("Package not found in registry: {}", package_name);
            return None;
        }
        Err(e) => {
            error!("Failed to fetch package info for {}: {}", package_name, e);
            return None;
        }
    };

    let cache = Arc::clone(cache);
    let stored = tokio::task::spawn_blocking(move || {
        let result = cache.store(&record);
        (record, result)
    })
    .await;

    match stored {
        Ok((record, Ok(()))) => {
            debug!(
                "Cached {} versions for {}",
                record.versions().len(),
                package_name
            );
            Some(record)
        }
        Ok((record, Err(e))) => {
            error!("Failed to cache package info for {}: {}", package_name, e);
            Some(record)
        }
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        // Runtime shutdown; the worker is about to be cancelled too
        Err(_) => None,
    }
}

/// Refresh the given packages from the registry with a fixed number of workers.
///
/// Each worker pulls names from a shared queue until it is drained, so one
/// stalled request only holds up that worker. Results are returned rather than
/// merged in place; the caller merges them in one pass.
pub async fn refresh_packages(
    registry: Arc<dyn Registry>,
    cache: Arc<DiskCache>,
    package_names: Vec<String>,
    worker_count: usize,
    progress: Arc<SyncProgress>,
) -> Result<Vec<PackageRecord>, SyncError> {
    if package_names.is_empty() {
        return Ok(Vec::new());
    }

    info!("Refreshing {} packages from the registry", package_names.len());
    progress.begin(SyncPhase::FetchingVersions, package_names.len());

    let queue = WorkQueue::new(package_names);
    let handles = (0..worker_count.max(1))
        .map(|_| {
            let queue = Arc::clone(&queue);
            let registry = Arc::clone(&registry);
            let cache = Arc::clone(&cache);
            let progress = Arc::clone(&progress);
            tokio::spawn(async move {
                let mut fetched = Vec::new();
                while let Some(name) = queue.next() {
                    if let Some(record) =
                        fetch_and_cache_package(registry.as_ref(), &cache, &name).await
                    {
                        fetched.push(record);
                    }
                    progress.advance();
                }
                fetched
            })
        })
        .collect();

    let fetched: Vec<PackageRecord> = join_workers(handles).await?.into_iter().flatten().collect();
    info!("Fetched {} packages from the registry", fetched.len());
    Ok(fetched)
}
