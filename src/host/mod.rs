//! The host project: which packages are installed and how to change that
//!
//! - [`project`]: [`HostInventory`] backed by a project's lockfile
//! - [`manifest`]: editing the project's dependency manifest

pub mod manifest;
pub mod project;

#[cfg(test)]
use mockall::automock;

use crate::error::HostError;
use crate::version::{PackageDependency, VersionInfo, VersionMetadata, VersionNumber};

pub use manifest::ProjectManifest;
pub use project::ProjectInventory;

/// Where the host resolved an installed package from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HostSource {
    #[default]
    Registry,
    Embedded,
    Local,
    LocalTarball,
    Git,
    BuiltIn,
    Unknown,
}

impl HostSource {
    /// Parse the source names used in lockfiles
    pub fn from_lock_name(name: &str) -> Self {
        match name {
            "registry" => HostSource::Registry,
            "embedded" => HostSource::Embedded,
            "local" => HostSource::Local,
            "local-tarball" => HostSource::LocalTarball,
            "git" => HostSource::Git,
            "builtin" => HostSource::BuiltIn,
            _ => HostSource::Unknown,
        }
    }

    /// Packages that come with their own metadata on disk
    pub fn is_on_disk(&self) -> bool {
        matches!(
            self,
            HostSource::Embedded | HostSource::Local | HostSource::LocalTarball
        )
    }
}

/// A package the host reports as installed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub source: HostSource,
    pub is_direct: bool,
    pub display_name: String,
    pub description: String,
    pub author: String,
    pub keywords: Vec<String>,
    pub dependencies: Vec<PackageDependency>,
    /// Versions the host considers compatible, oldest first
    pub compatible_versions: Vec<String>,
    pub verified_version: Option<String>,
}

impl InstalledPackage {
    /// Build a version entry from host data alone.
    ///
    /// Installed versions are always compatible with the running engine, so the
    /// required engine version is the host's own.
    pub fn to_version_info(&self, engine_version: VersionNumber) -> VersionInfo {
        VersionInfo::new(VersionMetadata {
            version: self.version.clone(),
            title: self.display_name.clone(),
            package_name: self.name.clone(),
            description: self.description.clone(),
            date_published: None,
            engine_version,
            keywords: self.keywords.clone(),
            category: String::new(),
            team: String::new(),
            author: self.author.clone(),
            is_supported: false,
            dependencies: self.dependencies.clone(),
            samples: None,
        })
    }
}

/// Access to the host's package inventory
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait HostInventory: Send + Sync {
    /// Version of the engine the host project runs on
    fn engine_version(&self) -> VersionNumber;

    /// List direct and indirect installed packages without touching the network
    async fn list_installed(&self) -> Result<Vec<InstalledPackage>, HostError>;

    /// Tell the host its manifest changed and packages need resolving again
    async fn resolve(&self) -> Result<(), HostError>;
}
