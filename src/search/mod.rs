//! Incremental search over catalog snapshots
//!
//! - [`criteria`]: terms, toggles and filter groups, with a modification counter
//! - [`filter`]: keyword filter groups and their match counts
//! - [`sort`]: result orderings
//! - [`searcher`]: cached filtering of a snapshot against criteria

pub mod criteria;
pub mod filter;
pub mod searcher;
pub mod sort;

pub use criteria::{ActiveTag, SearchCriteria, TagAction, Toggle};
pub use filter::{FilterGroup, FilterKind, Keyword};
pub use searcher::PackageSearcher;
pub use sort::SortMethod;
