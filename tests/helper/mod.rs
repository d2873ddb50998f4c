//! Shared fixtures for integration tests
#![allow(dead_code)]

pub mod project;
pub mod registry;

use std::sync::Arc;

use package_catalog::catalog::{CatalogSynchronizer, DiskCache, SyncOptions};
use package_catalog::host::{HostInventory, ProjectManifest};

pub use project::{FakeHost, TestProject};
pub use registry::{Release, TestRegistry};

/// A synchronizer over a test project, its cache directory and a test registry
pub fn create_synchronizer(
    project: &TestProject,
    registry: &TestRegistry,
    host: Arc<dyn HostInventory>,
) -> CatalogSynchronizer {
    CatalogSynchronizer::new(
        registry.client(),
        host,
        DiskCache::new(project.cache_dir()),
        ProjectManifest::new(project.path(), registry.url()),
        SyncOptions {
            worker_count: 4,
            registry_url: registry.url(),
        },
    )
}
