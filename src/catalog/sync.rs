//! The synchronization cycle and its single-flight query

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::catalog::cache::DiskCache;
use crate::catalog::installed::InstalledInfo;
use crate::catalog::progress::{SyncPhase, SyncProgress};
use crate::catalog::record::PackageRecord;
use crate::catalog::refresh::{join_task, refresh_packages, stale_packages};
use crate::catalog::snapshot::{CatalogSnapshot, SyncWarning};
use crate::config::{CatalogConfig, DEFAULT_REGISTRY_URL, DEFAULT_WORKER_COUNT};
use crate::error::SyncError;
use crate::history::InstallObserver;
use crate::host::{HostInventory, HostSource, InstalledPackage, ProjectManifest};
use crate::registry::Registry;
use crate::version::VersionNumber;

/// Clonable handle on one synchronization cycle
pub type CatalogQuery = Shared<BoxFuture<'static, Result<Arc<CatalogSnapshot>, Arc<SyncError>>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Workers used for cache loading and for registry fetches
    pub worker_count: usize,
    /// Shown in warnings when the registry cannot be reached
    pub registry_url: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
        }
    }
}

impl From<&CatalogConfig> for SyncOptions {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            worker_count: config.cache.worker_count,
            registry_url: config.registry.url.clone(),
        }
    }
}

/// Everything a cycle needs, shared with the spawned cycle task
struct SyncContext {
    registry: Arc<dyn Registry>,
    host: Arc<dyn HostInventory>,
    cache: Arc<DiskCache>,
    progress: Arc<SyncProgress>,
    options: SyncOptions,
}

struct InFlight {
    query: CatalogQuery,
    task: AbortHandle,
}

impl InFlight {
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn has_failed(&self) -> bool {
        matches!(self.query.peek(), Some(Err(_)))
    }
}

/// Produces catalog snapshots and applies install changes to the host project.
///
/// One instance per process; consumers share it. At most one cycle runs at a
/// time and concurrent callers of [`query`](Self::query) share it.
pub struct CatalogSynchronizer {
    context: Arc<SyncContext>,
    pub(crate) manifest: ProjectManifest,
    pub(crate) observer: Option<Arc<dyn InstallObserver>>,
    current: Mutex<Option<InFlight>>,
}

impl CatalogSynchronizer {
    pub fn new(
        registry: Arc<dyn Registry>,
        host: Arc<dyn HostInventory>,
        cache: DiskCache,
        manifest: ProjectManifest,
        options: SyncOptions,
    ) -> Self {
        Self {
            context: Arc::new(SyncContext {
                registry,
                host,
                cache: Arc::new(cache),
                progress: Arc::new(SyncProgress::new()),
                options,
            }),
            manifest,
            observer: None,
            current: Mutex::new(None),
        }
    }

    /// Notify `observer` of every install and uninstall made through this synchronizer
    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub(crate) fn host(&self) -> &dyn HostInventory {
        self.context.host.as_ref()
    }

    /// Return the running or most recent cycle, starting a new one when there
    /// is none, when the last one failed, or when `force_refresh` is set and
    /// the last one has completed. A forced refresh never starts a second
    /// cycle while one is running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn query(&self, force_refresh: bool) -> CatalogQuery {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(in_flight) = current.as_ref() {
            if !in_flight.has_failed() && !(force_refresh && in_flight.is_finished()) {
                return in_flight.query.clone();
            }
        }

        let in_flight = self.start_cycle(force_refresh);
        let query = in_flight.query.clone();
        *current = Some(in_flight);
        query
    }

    /// Forget the current cycle so the next query starts a new one
    pub fn invalidate(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }

    /// Abort the running cycle, if any.
    ///
    /// Callers already waiting on it get [`SyncError::Interrupted`]; the next
    /// query starts a new cycle. A completed cycle is left alone.
    pub fn cancel(&self) {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if current.as_ref().is_some_and(|in_flight| !in_flight.is_finished()) {
            if let Some(in_flight) = current.take() {
                debug!("Aborting the running synchronization cycle");
                in_flight.task.abort();
            }
        }
    }

    /// Snapshot of the last cycle, if it has completed successfully and been awaited
    pub fn current_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        let current = self.current.lock().ok()?;
        match current.as_ref()?.query.peek()? {
            Ok(snapshot) => Some(Arc::clone(snapshot)),
            Err(_) => None,
        }
    }

    pub fn progress(&self) -> &SyncProgress {
        &self.context.progress
    }

    fn start_cycle(&self, force_refresh: bool) -> InFlight {
        let context = Arc::clone(&self.context);
        let handle = tokio::spawn(async move { context.run_cycle(force_refresh).await });
        let task = handle.abort_handle();

        let query = async move {
            match handle.await {
                Ok(result) => result.map(Arc::new).map_err(Arc::new),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(Arc::new(SyncError::Interrupted)),
            }
        }
        .boxed()
        .shared();

        InFlight { query, task }
    }
}

impl SyncContext {
    /// One cycle: load cache and host inventory, refresh from the registry if
    /// needed, merge, finalize.
    async fn run_cycle(&self, force_refresh: bool) -> Result<CatalogSnapshot, SyncError> {
        info!("Starting catalog synchronization (force refresh: {})", force_refresh);

        let host = Arc::clone(&self.host);
        let installed_task = tokio::spawn(async move { host.list_installed().await });

        let mut packages = self
            .cache
            .load_all(self.options.worker_count, Arc::clone(&self.progress))
            .await?;

        self.progress.enter(SyncPhase::QueryingHost);
        let installed = join_task(installed_task).await??;
        debug!(
            "Loaded {} cached packages and {} installed packages",
            packages.len(),
            installed.len()
        );

        let mut warnings = Vec::new();
        if force_refresh || packages.is_empty() {
            self.refresh_from_registry(&mut packages, &mut warnings)
                .await?;
        }

        self.progress.enter(SyncPhase::Finalizing);
        let engine = self.host.engine_version();
        merge_installed(&mut packages, &installed, engine);
        let snapshot = build_snapshot(packages, &installed, engine, warnings);

        self.progress.finish();
        info!(
            "Catalog synchronized with {} packages",
            snapshot.records().len()
        );
        Ok(snapshot)
    }

    async fn refresh_from_registry(
        &self,
        packages: &mut HashMap<String, PackageRecord>,
        warnings: &mut Vec<SyncWarning>,
    ) -> Result<(), SyncError> {
        self.progress.enter(SyncPhase::WaitingForRegistry);

        if let Err(e) = self.registry.ping().await {
            warn!(
                "Could not reach the package registry at {} to refresh packages: {}",
                self.options.registry_url, e
            );
            warnings.push(SyncWarning::RegistryUnreachable {
                url: self.options.registry_url.clone(),
                reason: e.to_string(),
            });
            return Ok(());
        }

        let index = match self.registry.fetch_index().await {
            Ok(index) => index,
            Err(e) => {
                warn!("Failed to fetch the registry index: {}", e);
                warnings.push(SyncWarning::IndexUnavailable {
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        let stale = stale_packages(&index, packages);
        let fetched = refresh_packages(
            Arc::clone(&self.registry),
            Arc::clone(&self.cache),
            stale,
            self.options.worker_count,
            Arc::clone(&self.progress),
        )
        .await?;

        for record in fetched {
            packages.insert(record.name().to_string(), record);
        }
        Ok(())
    }
}

/// Fold host-reported packages into the merged map.
///
/// A version installed from the registry keeps its registry metadata. Any other
/// source (embedded, local, git, ...) carries the local copy's metadata, which
/// replaces a registry entry for the same version. Packages unknown to the
/// cache get a record built from host data alone.
pub fn merge_installed(
    packages: &mut HashMap<String, PackageRecord>,
    installed: &[InstalledPackage],
    engine: VersionNumber,
) {
    for package in installed {
        let record = packages
            .entry(package.name.clone())
            .or_insert_with(|| PackageRecord::new(package.name.clone(), Vec::new()));

        if package.verified_version.is_some() {
            record.set_verified_version(package.verified_version.clone());
        }

        if package.source == HostSource::Registry && record.has_version(&package.version) {
            continue;
        }

        record.replace_version(package.to_version_info(engine));
    }
}

/// Finalize every record and derive install state against the result
pub fn build_snapshot(
    packages: HashMap<String, PackageRecord>,
    installed: &[InstalledPackage],
    engine: VersionNumber,
    warnings: Vec<SyncWarning>,
) -> CatalogSnapshot {
    let installed_versions: HashMap<&str, &str> = installed
        .iter()
        .map(|p| (p.name.as_str(), p.version.as_str()))
        .collect();

    let records: Vec<PackageRecord> = packages
        .into_values()
        .filter_map(|record| {
            let installed_version = installed_versions.get(record.name()).copied();
            record.finalize(installed_version, engine)
        })
        .collect();

    let by_name: HashMap<&str, &PackageRecord> = records.iter().map(|r| (r.name(), r)).collect();
    let installed_info: HashMap<String, InstalledInfo> = installed
        .iter()
        .map(|package| {
            let info = match by_name.get(package.name.as_str()) {
                Some(record) if package.compatible_versions.is_empty() => {
                    InstalledInfo::from_package(&with_compatible_versions(package, record, engine))
                }
                _ => InstalledInfo::from_package(package),
            };
            (package.name.clone(), info)
        })
        .collect();

    CatalogSnapshot::new(records, installed_info, engine, warnings)
}

/// The host reports no compatible versions offline; use the record's, oldest first
fn with_compatible_versions(
    package: &InstalledPackage,
    record: &PackageRecord,
    engine: VersionNumber,
) -> InstalledPackage {
    let mut compatible: Vec<String> = record
        .compatible_versions(engine)
        .map(|v| v.version().to_string())
        .collect();
    compatible.reverse();

    InstalledPackage {
        compatible_versions: compatible,
        verified_version: package
            .verified_version
            .clone()
            .or_else(|| record.verified_version().map(String::from)),
        ..package.clone()
    }
}
