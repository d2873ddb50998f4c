//! Locally cached package catalog engine
//!
//! Keeps an on-disk cache of registry packages, merges it with the packages
//! installed in a host project, and answers version-selection, upgrade,
//! dependency-namespace and search queries over immutable snapshots.
//!
//! # Modules
//!
//! - [`version`]: version number parsing and the version-list ordering
//! - [`catalog`]: records, snapshots, the disk cache and the synchronizer
//! - [`registry`]: remote registry access
//! - [`host`]: installed-package inventory and manifest editing
//! - [`history`]: install history used for "recently installed" ordering
//! - [`search`]: incremental filtering and sorting of snapshots
//! - [`config`]: configuration and well-known paths
//! - [`error`]: error types

pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod host;
pub mod registry;
pub mod search;
pub mod version;
