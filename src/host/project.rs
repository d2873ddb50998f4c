//! Installed-package inventory read from a project directory

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host::{HostInventory, HostSource, InstalledPackage};
use crate::registry::types::PackageJson;
use crate::version::VersionNumber;

const LOCKFILE_PATH: &str = "Packages/packages-lock.json";
const PROJECT_VERSION_PATH: &str = "ProjectSettings/ProjectVersion.txt";
const EDITOR_VERSION_KEY: &str = "m_EditorVersion:";

#[derive(Debug, Default, Deserialize)]
struct Lockfile {
    #[serde(default)]
    dependencies: IndexMap<String, LockEntry>,
}

#[derive(Debug, Deserialize)]
struct LockEntry {
    version: String,
    /// 0 for packages listed in the manifest
    #[serde(default)]
    depth: u32,
    #[serde(default)]
    source: String,
}

/// Reads installed packages from `Packages/packages-lock.json`.
///
/// Package metadata comes from each package's own `package.json` when it can
/// be found on disk. Nothing here touches the network.
pub struct ProjectInventory {
    project_dir: PathBuf,
    engine_version: VersionNumber,
}

impl ProjectInventory {
    /// Open a project, reading its engine version unless one is given
    pub fn open(
        project_dir: impl Into<PathBuf>,
        engine_version: Option<VersionNumber>,
    ) -> Result<Self, HostError> {
        let project_dir = project_dir.into();
        let engine_version = match engine_version {
            Some(version) => version,
            None => read_engine_version(&project_dir)?,
        };
        debug!(
            "Opened project {:?} with engine version {}",
            project_dir, engine_version
        );

        Ok(Self {
            project_dir,
            engine_version,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }
}

#[async_trait::async_trait]
impl HostInventory for ProjectInventory {
    fn engine_version(&self) -> VersionNumber {
        self.engine_version
    }

    async fn list_installed(&self) -> Result<Vec<InstalledPackage>, HostError> {
        let project_dir = self.project_dir.clone();
        tokio::task::spawn_blocking(move || read_installed(&project_dir))
            .await
            .map_err(|e| HostError::Request(e.to_string()))?
    }

    async fn resolve(&self) -> Result<(), HostError> {
        // The lockfile is rewritten by the host's own resolver; nothing to trigger here.
        debug!("Manifest changed in {:?}", self.project_dir);
        Ok(())
    }
}

fn read_engine_version(project_dir: &Path) -> Result<VersionNumber, HostError> {
    let path = project_dir.join(PROJECT_VERSION_PATH);
    let contents = std::fs::read_to_string(&path).map_err(|source| HostError::Io {
        path: path.clone(),
        source,
    })?;

    let raw = contents
        .lines()
        .find_map(|line| line.trim().strip_prefix(EDITOR_VERSION_KEY))
        .map(str::trim)
        .ok_or_else(|| HostError::EngineVersion(format!("no {EDITOR_VERSION_KEY} in {path:?}")))?;

    VersionNumber::parse(raw).map_err(|e| HostError::EngineVersion(e.to_string()))
}

fn read_installed(project_dir: &Path) -> Result<Vec<InstalledPackage>, HostError> {
    let path = project_dir.join(LOCKFILE_PATH);
    let lockfile: Lockfile = match std::fs::read_to_string(&path) {
        Ok(contents) => {
            serde_json::from_str(&contents).map_err(|source| HostError::Json {
                path: path.clone(),
                source,
            })?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No lockfile at {:?}, assuming nothing is installed", path);
            Lockfile::default()
        }
        Err(source) => return Err(HostError::Io { path, source }),
    };

    let packages = lockfile
        .dependencies
        .into_iter()
        .map(|(name, entry)| installed_package(project_dir, name, entry))
        .collect();

    Ok(packages)
}

fn installed_package(project_dir: &Path, name: String, entry: LockEntry) -> InstalledPackage {
    let source = HostSource::from_lock_name(&entry.source);
    let manifest = package_dir(project_dir, &name, &entry.version, source)
        .and_then(|dir| read_package_json(&dir.join("package.json")));

    // Disk packages are locked as `file:...`; their real version lives in package.json
    let version = match &manifest {
        Some(json) if source.is_on_disk() && !json.version.is_empty() => json.version.clone(),
        _ => entry.version,
    };

    let mut package = InstalledPackage {
        display_name: name.clone(),
        name,
        version,
        source,
        is_direct: entry.depth == 0,
        ..Default::default()
    };

    if let Some(json) = manifest {
        if !json.display_name.trim().is_empty() {
            package.display_name = json.display_name.clone();
        }
        package.author = json.author_name();
        package.dependencies = json.dependency_list();
        package.description = json.description;
        package.keywords = json.keywords;
    }

    package
}

fn package_dir(project_dir: &Path, name: &str, version: &str, source: HostSource) -> Option<PathBuf> {
    let packages_dir = project_dir.join("Packages");
    match source {
        HostSource::Embedded => Some(packages_dir.join(name)),
        HostSource::Local => version.strip_prefix("file:").map(|p| packages_dir.join(p)),
        HostSource::LocalTarball | HostSource::Unknown => None,
        _ => Some(
            project_dir
                .join("Library/PackageCache")
                .join(format!("{name}@{version}")),
        ),
    }
}

fn read_package_json(path: &Path) -> Option<PackageJson> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents)
        .inspect_err(|e| warn!("Ignoring malformed package manifest {:?}: {}", path, e))
        .ok()
}
