//! Orderings of a filtered package list

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogSnapshot, PackageRecord};
use crate::history::InstallOrdering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMethod {
    #[default]
    Title,
    UpdatedDate,
    RecentlyInstalled,
}

impl SortMethod {
    pub fn label(&self) -> &'static str {
        match self {
            SortMethod::Title => "Title",
            SortMethod::UpdatedDate => "Recently Updated",
            SortMethod::RecentlyInstalled => "Recently Installed",
        }
    }

    /// Sort `records` in place
    pub fn sort(
        &self,
        records: &mut [Arc<PackageRecord>],
        snapshot: &CatalogSnapshot,
        ordering: &dyn InstallOrdering,
    ) {
        match self {
            SortMethod::Title => records.sort_by(|a, b| title(a).cmp(title(b))),
            SortMethod::UpdatedDate => records.sort_by_key(|r| Reverse(date_published(r))),
            // Install order first (never installed last), then installed
            // packages, then newest publish date
            SortMethod::RecentlyInstalled => records.sort_by_cached_key(|r| {
                (
                    Reverse(ordering.install_order(r.name())),
                    !snapshot.is_installed(r.name()),
                    Reverse(date_published(r)),
                )
            }),
        }
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SortMethod::Title),
            "updated" => Ok(SortMethod::UpdatedDate),
            "recent" => Ok(SortMethod::RecentlyInstalled),
            _ => Err(format!(
                "unknown sort method '{s}', expected one of: title, updated, recent"
            )),
        }
    }
}

fn title(record: &PackageRecord) -> &str {
    record.default_version().map(|v| v.title()).unwrap_or_default()
}

fn date_published(record: &PackageRecord) -> Option<DateTime<Utc>> {
    record.default_version().and_then(|v| v.date_published())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("title", SortMethod::Title)]
    #[case("updated", SortMethod::UpdatedDate)]
    #[case("recent", SortMethod::RecentlyInstalled)]
    fn parses_cli_names(#[case] input: &str, #[case] expected: SortMethod) {
        assert_eq!(input.parse::<SortMethod>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("popular".parse::<SortMethod>().is_err());
    }
}
