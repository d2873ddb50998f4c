//! Metadata for one published version and the ordering of version lists

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::number::VersionNumber;

/// A declared dependency of a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDependency {
    pub name: String,
    pub version_range: String,
}

/// A sample/example asset bundle shipped with a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleData {
    pub display_name: String,
    pub description: String,
    /// Path of the sample relative to the package root
    pub path: String,
}

/// Plain, serializable data of one published version.
///
/// This is the shape written to the disk cache. [`VersionInfo`] wraps it with
/// the flags derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VersionMetadata {
    pub version: String,
    pub title: String,
    pub package_name: String,
    pub description: String,
    pub date_published: Option<DateTime<Utc>>,
    /// Minimum engine version required by this release
    pub engine_version: VersionNumber,
    pub keywords: Vec<String>,
    pub category: String,
    pub team: String,
    pub author: String,
    pub is_supported: bool,
    pub dependencies: Vec<PackageDependency>,
    /// `None` when the release declares no samples at all
    pub samples: Option<Vec<SampleData>>,
}

/// One published version of a package. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VersionMetadata", into = "VersionMetadata")]
pub struct VersionInfo {
    meta: VersionMetadata,
    is_deprecated: bool,
    is_empty: bool,
}

impl From<VersionMetadata> for VersionInfo {
    fn from(meta: VersionMetadata) -> Self {
        Self::new(meta)
    }
}

impl From<VersionInfo> for VersionMetadata {
    fn from(info: VersionInfo) -> Self {
        info.meta
    }
}

impl VersionInfo {
    pub fn new(meta: VersionMetadata) -> Self {
        let is_deprecated = has_keyword(&meta.keywords, "deprecated");
        let is_empty = has_keyword(&meta.keywords, "empty");
        Self {
            meta,
            is_deprecated,
            is_empty,
        }
    }

    pub fn metadata(&self) -> &VersionMetadata {
        &self.meta
    }

    pub fn version(&self) -> &str {
        &self.meta.version
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn package_name(&self) -> &str {
        &self.meta.package_name
    }

    pub fn description(&self) -> &str {
        &self.meta.description
    }

    pub fn date_published(&self) -> Option<DateTime<Utc>> {
        self.meta.date_published
    }

    pub fn engine_version(&self) -> VersionNumber {
        self.meta.engine_version
    }

    pub fn keywords(&self) -> &[String] {
        &self.meta.keywords
    }

    pub fn category(&self) -> &str {
        &self.meta.category
    }

    pub fn team(&self) -> &str {
        &self.meta.team
    }

    pub fn author(&self) -> &str {
        &self.meta.author
    }

    pub fn is_supported(&self) -> bool {
        self.meta.is_supported
    }

    pub fn dependencies(&self) -> &[PackageDependency] {
        &self.meta.dependencies
    }

    pub fn samples(&self) -> &[SampleData] {
        self.meta.samples.as_deref().unwrap_or_default()
    }

    pub fn has_samples(&self) -> bool {
        self.meta.samples.is_some()
    }

    pub fn is_deprecated(&self) -> bool {
        self.is_deprecated
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn is_preview(&self) -> bool {
        is_preview(&self.meta.version)
    }

    /// True when the host engine satisfies this release's minimum engine version
    pub fn is_compatible_with(&self, engine: VersionNumber) -> bool {
        engine >= self.meta.engine_version
    }

    /// A version is usable only with a version string, a title and a package name
    pub fn is_valid(&self) -> bool {
        !self.meta.version.trim().is_empty()
            && !self.meta.title.trim().is_empty()
            && !self.meta.package_name.trim().is_empty()
    }

    /// Ordering used for version lists, see [`compare_version_strings`]
    pub fn precedence(&self, other: &Self) -> Ordering {
        compare_version_strings(&self.meta.version, &other.meta.version)
    }
}

fn has_keyword(keywords: &[String], keyword: &str) -> bool {
    keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
}

/// Pre-release versions carry a `-` separator
pub fn is_preview(version: &str) -> bool {
    version.contains('-')
}

/// Order two version strings so that the preferred one sorts first.
///
/// 1. Larger numeric core first. Strings whose core does not parse sort last.
/// 2. Non-preview before preview.
/// 3. More `.`-separated tokens first.
/// 4. Token by token: numeric tokens by value (larger first), other tokens
///    lexicographically (larger first), a numeric token before a non-numeric one.
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
    let a_core = VersionNumber::parse(a).ok();
    let b_core = VersionNumber::parse(b).ok();
    if a_core != b_core {
        return b_core.cmp(&a_core);
    }

    let (a_preview, b_preview) = (is_preview(a), is_preview(b));
    if a_preview != b_preview {
        return if a_preview {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let a_tokens: Vec<&str> = a.split('.').collect();
    let b_tokens: Vec<&str> = b.split('.').collect();
    if a_tokens.len() != b_tokens.len() {
        return b_tokens.len().cmp(&a_tokens.len());
    }

    for (a_token, b_token) in a_tokens.iter().zip(&b_tokens) {
        let result = match (is_numeric(a_token), is_numeric(b_token)) {
            (true, true) => compare_numeric(b_token, a_token),
            (false, false) => b_token.cmp(a_token),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        };
        if result != Ordering::Equal {
            return result;
        }
    }

    Ordering::Equal
}

/// Sort a version list so the most preferred version comes first
pub fn sort_versions(versions: &mut [VersionInfo]) {
    versions.sort_by(VersionInfo::precedence);
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two digit strings by value without overflowing
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
