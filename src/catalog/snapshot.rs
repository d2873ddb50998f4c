//! Immutable view of one synchronized catalog

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::catalog::installed::{InstallSource, InstalledInfo};
use crate::catalog::record::PackageRecord;
use crate::error::CatalogError;
use crate::version::{VersionInfo, VersionNumber};

/// Non-fatal problem met while producing a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// The reachability check failed, the catalog comes from the cache only
    RegistryUnreachable { url: String, reason: String },
    /// The registry answered the reachability check but its index could not be read
    IndexUnavailable { reason: String },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::RegistryUnreachable { url, reason } => write!(
                f,
                "Could not reach the package registry at {url} to refresh packages ({reason}); \
                 showing cached packages only"
            ),
            SyncWarning::IndexUnavailable { reason } => {
                write!(f, "Could not read the registry index ({reason}); showing cached packages only")
            }
        }
    }
}

/// Namespace of a package name: its first two dot-separated segments
pub fn namespace_of(package_name: &str) -> &str {
    match package_name.match_indices('.').nth(1) {
        Some((end, _)) => &package_name[..end],
        None => package_name,
    }
}

/// One fully merged catalog. Never mutated after construction, so it can be
/// shared freely between readers.
#[derive(Debug)]
pub struct CatalogSnapshot {
    records: Vec<Arc<PackageRecord>>,
    by_name: HashMap<String, usize>,
    installed: HashMap<String, InstalledInfo>,
    /// Union of declared dependency names over every version of each package
    direct_dependencies: HashMap<String, BTreeSet<String>>,
    namespaces: Mutex<HashMap<String, Arc<BTreeSet<String>>>>,
    engine_version: VersionNumber,
    warnings: Vec<SyncWarning>,
}

impl CatalogSnapshot {
    /// Build a snapshot from finalized records. Records are ordered by name.
    pub fn new(
        mut records: Vec<PackageRecord>,
        installed: HashMap<String, InstalledInfo>,
        engine_version: VersionNumber,
        warnings: Vec<SyncWarning>,
    ) -> Self {
        records.sort_by(|a, b| a.name().cmp(b.name()));

        let by_name = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.name().to_string(), i))
            .collect();

        let direct_dependencies = records
            .iter()
            .map(|record| {
                let names = record
                    .versions()
                    .iter()
                    .flat_map(|v| v.dependencies())
                    .map(|d| d.name.clone())
                    .collect();
                (record.name().to_string(), names)
            })
            .collect();

        Self {
            records: records.into_iter().map(Arc::new).collect(),
            by_name,
            installed,
            direct_dependencies,
            namespaces: Mutex::new(HashMap::new()),
            engine_version,
            warnings,
        }
    }

    pub fn records(&self) -> &[Arc<PackageRecord>] {
        &self.records
    }

    pub fn record(&self, package_name: &str) -> Option<&Arc<PackageRecord>> {
        self.by_name.get(package_name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, package_name: &str) -> bool {
        self.by_name.contains_key(package_name)
    }

    pub fn engine_version(&self) -> VersionNumber {
        self.engine_version
    }

    pub fn warnings(&self) -> &[SyncWarning] {
        &self.warnings
    }

    /// Look up one version of one package
    pub fn version_info(&self, package_name: &str, version: &str) -> Result<&VersionInfo, CatalogError> {
        let record = self
            .record(package_name)
            .ok_or_else(|| CatalogError::PackageNotFound(package_name.to_string()))?;
        record
            .version(version)
            .ok_or_else(|| CatalogError::VersionNotFound {
                package: package_name.to_string(),
                version: version.to_string(),
            })
    }

    // ---------------------------------------------------------------------
    // Install state
    // ---------------------------------------------------------------------

    pub fn installed(&self, package_name: &str) -> Option<&InstalledInfo> {
        self.installed.get(package_name)
    }

    /// Every installed package with its install state
    pub fn installed_packages(&self) -> impl Iterator<Item = (&str, &InstalledInfo)> {
        self.installed.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn install_source(&self, package_name: &str) -> Option<InstallSource> {
        self.installed(package_name).map(|info| info.source)
    }

    pub fn installed_version(&self, package_name: &str) -> Option<&str> {
        self.installed(package_name)
            .map(|info| info.installed_version.as_str())
    }

    pub fn is_installed(&self, package_name: &str) -> bool {
        self.installed.contains_key(package_name)
    }

    pub fn is_direct(&self, package_name: &str) -> bool {
        self.install_source(package_name) == Some(InstallSource::Direct)
    }

    pub fn is_indirect(&self, package_name: &str) -> bool {
        self.install_source(package_name) == Some(InstallSource::Indirect)
    }

    pub fn upgrade_version(&self, package_name: &str) -> Option<&str> {
        self.installed(package_name)
            .and_then(|info| info.upgrade_version.as_deref())
    }

    pub fn is_upgrade_available(&self, package_name: &str) -> bool {
        self.upgrade_version(package_name).is_some()
    }

    // ---------------------------------------------------------------------
    // Conservative dependency closure
    // ---------------------------------------------------------------------

    /// Dependency names declared by any version of the package, ignoring
    /// version ranges. `None` when the package is not in the catalog.
    pub fn direct_dependency_names_of(&self, package_name: &str) -> Option<&BTreeSet<String>> {
        self.direct_dependencies.get(package_name)
    }

    /// Every package that could be pulled in by any version of `package_name`.
    ///
    /// Dependencies outside the catalog are kept in the result but not
    /// followed. The package itself is only included when a cycle leads back
    /// to it.
    pub fn transitive_dependencies_of(&self, package_name: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut stack = vec![package_name];

        while let Some(name) = stack.pop() {
            let Some(dependencies) = self.direct_dependency_names_of(name) else {
                continue;
            };
            for dependency in dependencies {
                if result.insert(dependency.clone()) {
                    stack.push(dependency);
                }
            }
        }

        result
    }

    /// Namespaces a registry scope list needs to install `package_name`:
    /// its own namespace plus that of every transitive dependency. Memoized.
    pub fn transitive_namespaces_of(&self, package_name: &str) -> Arc<BTreeSet<String>> {
        if let Some(hit) = self
            .namespaces
            .lock()
            .ok()
            .and_then(|memo| memo.get(package_name).cloned())
        {
            return hit;
        }

        let namespaces: BTreeSet<String> = self
            .transitive_dependencies_of(package_name)
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(package_name))
            .map(|name| namespace_of(name).to_string())
            .collect();
        let namespaces = Arc::new(namespaces);

        if let Ok(mut memo) = self.namespaces.lock() {
            memo.insert(package_name.to_string(), Arc::clone(&namespaces));
        }
        namespaces
    }
}
