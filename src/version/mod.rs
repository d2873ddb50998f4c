//! Version numbers and version ordering
//!
//! - [`number`]: `major.minor.patch` parsing and comparison
//! - [`info`]: per-release metadata and the preferred-first ordering of
//!   version lists

pub mod info;
pub mod number;

pub use info::{PackageDependency, SampleData, VersionInfo, VersionMetadata};
pub use number::VersionNumber;
