//! Wire types shared by the registry and on-disk package manifests

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::version::{PackageDependency, SampleData, VersionMetadata, VersionNumber};

/// `[Prefix] Rest of title`
static BRACKETED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<prefix>[^\]]*)\](?P<rest>.*)$").expect("title pattern is valid")
});

/// Author field, either a bare name or an object with a name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Name(String),
    Detail {
        #[serde(default)]
        name: Option<String>,
    },
}

impl Author {
    pub fn name(&self) -> &str {
        match self {
            Author::Name(name) => name,
            Author::Detail { name } => name.as_deref().unwrap_or_default(),
        }
    }
}

/// Published manifests sometimes carry `null` where a value is expected; read
/// it as the field's default instead of rejecting the whole document
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SampleJson {
    #[serde(deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
}

/// A package manifest (`package.json`), as published for each registry version
/// and as found in a package folder on disk
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    /// Minimum engine version, e.g. `2021.3`
    pub unity: Option<String>,
    pub author: Option<Author>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(deserialize_with = "null_as_default")]
    pub team: String,
    #[serde(deserialize_with = "null_as_default")]
    pub supported: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub dependencies: IndexMap<String, String>,
    pub samples: Option<Vec<SampleJson>>,
}

impl PackageJson {
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(|a| a.name().to_string())
            .unwrap_or_default()
    }

    pub fn dependency_list(&self) -> Vec<PackageDependency> {
        self.dependencies
            .iter()
            .map(|(name, range)| PackageDependency {
                name: name.clone(),
                version_range: range.clone(),
            })
            .collect()
    }

    /// Convert a published manifest into version metadata
    pub fn into_metadata(
        self,
        package_name: &str,
        version: &str,
        date_published: Option<DateTime<Utc>>,
    ) -> VersionMetadata {
        let engine_version = self
            .unity
            .as_deref()
            .and_then(|v| VersionNumber::parse(v).ok())
            .unwrap_or_default();
        let author = self.author_name();
        let dependencies = self.dependency_list();

        VersionMetadata {
            version: version.to_string(),
            title: sanitize_title(&self.display_name),
            package_name: package_name.to_string(),
            description: self.description,
            date_published,
            engine_version,
            keywords: self.keywords,
            category: self.category,
            team: self.team,
            author,
            is_supported: self.supported,
            dependencies,
            samples: self.samples.map(|samples| {
                samples
                    .into_iter()
                    .map(|s| SampleData {
                        display_name: s.display_name,
                        description: s.description,
                        path: s.path,
                    })
                    .collect()
            }),
        }
    }
}

/// Turn `[Prefix] Title` into `Prefix Title`
pub fn sanitize_title(title: &str) -> String {
    match BRACKETED_TITLE.captures(title) {
        Some(caps) => format!("{} {}", &caps["prefix"], caps["rest"].trim()),
        None => title.to_string(),
    }
}

/// Full version history of one package
#[derive(Debug, Deserialize)]
pub struct PackageDocument {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: IndexMap<String, PackageJson>,
    /// Version -> publish timestamp, plus `created`/`modified` and, for
    /// unpublished packages, a non-string `unpublished` entry
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: HashMap<String, serde_json::Value>,
}

/// Response of the registry-wide search endpoint
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
pub struct SearchObject {
    pub package: SearchPackage,
}

#[derive(Debug, Deserialize)]
pub struct SearchPackage {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
}

impl SearchPackage {
    pub fn latest_version(&self) -> Option<&str> {
        self.dist_tags
            .get("latest")
            .or(self.version.as_ref())
            .map(String::as_str)
    }
}

/// One entry of the registry index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub latest_version: String,
}
