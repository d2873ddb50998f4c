//! Remote registry access
//!
//! - [`npm`]: npm-compatible HTTP registry
//! - [`types`]: wire types shared with on-disk package manifests

pub mod npm;
pub mod types;

#[cfg(test)]
use mockall::automock;

use crate::catalog::record::PackageRecord;
use crate::error::RegistryError;

pub use npm::NpmRegistry;
pub use types::IndexEntry;

/// Trait for reading package metadata from a registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Lightweight reachability check against the registry root
    async fn ping(&self) -> Result<(), RegistryError>;

    /// Fetch the registry-wide index of package names and latest versions
    async fn fetch_index(&self) -> Result<Vec<IndexEntry>, RegistryError>;

    /// Fetch the full version history of one package
    ///
    /// # Returns
    /// * `Ok(PackageRecord)` - Every published version, in registry order
    /// * `Err(RegistryError)` - If the fetch fails
    async fn fetch_package(&self, package_name: &str) -> Result<PackageRecord, RegistryError>;
}
