//! The package catalog
//!
//! - [`record`]: one package with its sorted versions and default version
//! - [`installed`]: install source classification and upgrade candidates
//! - [`snapshot`]: immutable query surface over one synchronized catalog
//! - [`cache`]: per-package JSON files on disk
//! - [`refresh`]: bounded worker pool fetching package details
//! - [`sync`]: the single-flight synchronization cycle
//! - [`install`]: manifest changes made through the synchronizer

pub mod cache;
pub mod install;
pub mod installed;
pub mod progress;
pub mod record;
pub mod refresh;
pub mod snapshot;
pub mod sync;

pub use cache::DiskCache;
pub use installed::{InstallSource, InstalledInfo};
pub use progress::{SyncPhase, SyncProgress};
pub use record::PackageRecord;
pub use snapshot::{CatalogSnapshot, SyncWarning, namespace_of};
pub use sync::{CatalogQuery, CatalogSynchronizer, SyncOptions};
