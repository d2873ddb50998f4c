//! Keyword filter groups

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogSnapshot, InstallSource, PackageRecord};

/// Package attribute a filter group matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    Tags,
    Author,
    Category,
    Source,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Tags,
        FilterKind::Author,
        FilterKind::Category,
        FilterKind::Source,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            FilterKind::Tags => "Tags",
            FilterKind::Author => "Author",
            FilterKind::Category => "Category",
            FilterKind::Source => "Source",
        }
    }

    /// Distinct, non-blank values of this attribute for a package's default version
    pub fn attribute_values<'a>(
        &self,
        snapshot: &'a CatalogSnapshot,
        record: &'a PackageRecord,
    ) -> BTreeSet<&'a str> {
        let default = record.default_version();
        let values: Vec<&str> = match self {
            FilterKind::Tags => default
                .map(|v| v.keywords().iter().map(String::as_str).collect::<Vec<_>>())
                .unwrap_or_default(),
            FilterKind::Author => default.map(|v| v.author()).into_iter().collect(),
            FilterKind::Category => default.map(|v| v.category()).into_iter().collect(),
            FilterKind::Source => snapshot
                .install_source(record.name())
                .map(|s| s.as_str())
                .into_iter()
                .collect(),
        };
        values
            .into_iter()
            .filter(|value| !value.trim().is_empty())
            .collect()
    }

    /// Human-readable name for a keyword id
    fn display_for(&self, id: &str) -> String {
        match self {
            FilterKind::Source => id
                .parse::<InstallSource>()
                .map(|s| s.display_name().to_string())
                .unwrap_or_else(|_| id.to_string()),
            _ => id.to_string(),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    pub id: String,
    pub display: String,
    pub enabled: bool,
    pub match_count: usize,
}

/// Keywords of one attribute. Matching is OR across the enabled keywords;
/// with none enabled the group matches everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    kind: FilterKind,
    #[serde(default)]
    keywords: Vec<Keyword>,
    #[serde(skip)]
    modification_counter: u64,
}

impl FilterGroup {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            keywords: Vec::new(),
            modification_counter: 0,
        }
    }

    /// The source group, listing every install source in declaration order
    pub fn source() -> Self {
        let mut group = Self::new(FilterKind::Source);
        group.keywords = InstallSource::ALL
            .iter()
            .map(|source| Keyword {
                id: source.as_str().to_string(),
                display: source.display_name().to_string(),
                enabled: false,
                match_count: 0,
            })
            .collect();
        group
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    pub fn keyword(&self, id: &str) -> Option<&Keyword> {
        self.keywords.iter().find(|k| k.id == id)
    }

    pub fn modification_counter(&self) -> u64 {
        self.modification_counter
    }

    pub fn any_enabled(&self) -> bool {
        self.keywords.iter().any(|k| k.enabled)
    }

    pub fn reset_match_counts(&mut self) {
        self.modification_counter += 1;
        for keyword in &mut self.keywords {
            keyword.match_count = 0;
        }
    }

    /// Count one more match for `id`, adding the keyword if it is new
    pub fn increment_match_count(&mut self, id: &str) {
        self.modification_counter += 1;
        match self.keywords.iter_mut().find(|k| k.id == id) {
            Some(keyword) => keyword.match_count += 1,
            None => self.keywords.push(Keyword {
                id: id.to_string(),
                display: self.kind.display_for(id),
                enabled: false,
                match_count: 1,
            }),
        }
    }

    /// Returns whether the keyword existed and changed state
    pub fn set_keyword_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self
            .keywords
            .iter_mut()
            .find(|k| k.id == id && k.enabled != enabled)
        {
            Some(keyword) => {
                keyword.enabled = enabled;
                self.modification_counter += 1;
                true
            }
            None => false,
        }
    }

    pub fn disable_all(&mut self) {
        self.modification_counter += 1;
        for keyword in &mut self.keywords {
            keyword.enabled = false;
        }
    }

    /// Most matched first, ties by id. The source group keeps its fixed order.
    pub fn sort_by_match_count(&mut self) {
        if self.kind == FilterKind::Source {
            return;
        }
        self.modification_counter += 1;
        self.keywords.sort_by(|a, b| {
            b.match_count
                .cmp(&a.match_count)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    pub fn matches(&self, snapshot: &CatalogSnapshot, record: &PackageRecord) -> bool {
        let mut enabled = self.keywords.iter().filter(|k| k.enabled).peekable();
        if enabled.peek().is_none() {
            return true;
        }

        let values = self.kind.attribute_values(snapshot, record);
        enabled.any(|keyword| values.contains(keyword.id.as_str()))
    }
}
