//! A package and its ordered version list

use serde::{Deserialize, Serialize};

use crate::version::info::sort_versions;
use crate::version::{VersionInfo, VersionNumber};

/// Serialized shape of a record, as stored in the disk cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordData {
    pub package_name: String,
    pub verified_version: Option<String>,
    pub versions: Vec<VersionInfo>,
}

/// One package: its name, every known version and the default version.
///
/// The default is only meaningful after [`PackageRecord::finalize`], which
/// sorts the versions, picks the default and drops invalid entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordData", into = "RecordData")]
pub struct PackageRecord {
    name: String,
    verified_version: Option<String>,
    versions: Vec<VersionInfo>,
    default_index: Option<usize>,
    is_deprecated: bool,
}

impl From<RecordData> for PackageRecord {
    fn from(data: RecordData) -> Self {
        let mut record = Self::new(data.package_name, data.versions);
        record.verified_version = data.verified_version;
        record
    }
}

impl From<PackageRecord> for RecordData {
    fn from(record: PackageRecord) -> Self {
        Self {
            package_name: record.name,
            verified_version: record.verified_version,
            versions: record.versions,
        }
    }
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, versions: Vec<VersionInfo>) -> Self {
        let is_deprecated = versions.iter().any(VersionInfo::is_deprecated);
        Self {
            name: name.into(),
            verified_version: None,
            versions,
            default_index: None,
            is_deprecated,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verified_version(&self) -> Option<&str> {
        self.verified_version.as_deref()
    }

    pub fn set_verified_version(&mut self, version: Option<String>) {
        self.verified_version = version;
    }

    /// Versions, most preferred first once finalized
    pub fn versions(&self) -> &[VersionInfo] {
        &self.versions
    }

    pub fn version(&self, version: &str) -> Option<&VersionInfo> {
        self.versions.iter().find(|v| v.version() == version)
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.version(version).is_some()
    }

    /// First entry of the version list, the newest once finalized
    pub fn latest(&self) -> Option<&VersionInfo> {
        self.versions.first()
    }

    pub fn default_version(&self) -> Option<&VersionInfo> {
        self.default_index.and_then(|i| self.versions.get(i))
    }

    pub fn is_deprecated(&self) -> bool {
        self.is_deprecated
    }

    /// Versions the given engine can run, in list order
    pub fn compatible_versions(&self, engine: VersionNumber) -> impl Iterator<Item = &VersionInfo> {
        self.versions.iter().filter(move |v| v.is_compatible_with(engine))
    }

    /// Put `info` in the list, replacing an entry with the same version string
    pub fn replace_version(&mut self, info: VersionInfo) {
        self.versions.retain(|v| v.version() != info.version());
        self.is_deprecated |= info.is_deprecated();
        self.versions.push(info);
        self.default_index = None;
    }

    /// A record is valid once it has a default, a name, and only valid versions
    pub fn is_valid(&self) -> bool {
        self.default_index.is_some()
            && !self.name.trim().is_empty()
            && !self.versions.is_empty()
            && self.versions.iter().all(VersionInfo::is_valid)
    }

    /// Sort versions, pick the default, then drop invalid versions.
    ///
    /// Returns `None` when the record ends up invalid, including when the
    /// chosen default itself was invalid.
    pub fn finalize(mut self, installed_version: Option<&str>, engine: VersionNumber) -> Option<Self> {
        sort_versions(&mut self.versions);
        self.default_index = self.select_default(installed_version, engine);

        let default_version = self.default_version()?.version().to_string();
        if !self.default_version()?.is_valid() {
            return None;
        }

        self.versions.retain(VersionInfo::is_valid);
        self.default_index = self.versions.iter().position(|v| v.version() == default_version);
        self.is_deprecated = self.versions.iter().any(VersionInfo::is_deprecated);

        self.is_valid().then_some(self)
    }

    /// Choose the default version of a sorted list.
    ///
    /// An installed version wins when it is still listed. Otherwise the first of:
    /// compatible stable, compatible, stable, anything.
    fn select_default(&self, installed_version: Option<&str>, engine: VersionNumber) -> Option<usize> {
        if let Some(installed) = installed_version {
            if let Some(index) = self.versions.iter().position(|v| v.version() == installed) {
                return Some(index);
            }
        }

        let versions = &self.versions;
        let compatible = |v: &VersionInfo| v.is_compatible_with(engine);

        versions
            .iter()
            .position(|v| compatible(v) && !v.is_preview())
            .or_else(|| versions.iter().position(compatible))
            .or_else(|| versions.iter().position(|v| !v.is_preview()))
            .or((!versions.is_empty()).then_some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionMetadata;
    use crate::version::info::tests::version;

    const ENGINE: VersionNumber = VersionNumber::new(2022, 3, 0);

    fn record(versions: &[&str]) -> PackageRecord {
        PackageRecord::new(
            "com.test.pkg",
            versions.iter().map(|v| version("com.test.pkg", v)).collect(),
        )
    }

    fn requiring(version: &str, engine: VersionNumber) -> VersionInfo {
        VersionInfo::new(VersionMetadata {
            version: version.to_string(),
            title: "Pkg".to_string(),
            package_name: "com.test.pkg".to_string(),
            engine_version: engine,
            ..Default::default()
        })
    }

    fn default_of(record: PackageRecord, installed: Option<&str>) -> Option<String> {
        record
            .finalize(installed, ENGINE)
            .and_then(|r| r.default_version().map(|v| v.version().to_string()))
    }

    #[test]
    fn default_is_newest_stable_compatible_version() {
        let record = record(&["1.0.0", "2.0.0", "1.5.0-preview"]);
        assert_eq!(default_of(record, None), Some("2.0.0".to_string()));
    }

    #[test]
    fn default_prefers_installed_version() {
        let record = record(&["1.0.0", "2.0.0"]);
        assert_eq!(default_of(record, Some("1.0.0")), Some("1.0.0".to_string()));
    }

    #[test]
    fn default_ignores_installed_version_missing_from_list() {
        let record = record(&["1.0.0", "2.0.0"]);
        assert_eq!(default_of(record, Some("3.0.0")), Some("2.0.0".to_string()));
    }

    #[test]
    fn default_skips_incompatible_versions() {
        let record = PackageRecord::new(
            "com.test.pkg",
            vec![
                requiring("1.0.0", VersionNumber::new(2021, 1, 0)),
                requiring("2.0.0", VersionNumber::new(2023, 1, 0)),
            ],
        );
        assert_eq!(default_of(record, None), Some("1.0.0".to_string()));
    }

    #[test]
    fn default_falls_back_to_compatible_preview() {
        let record = PackageRecord::new(
            "com.test.pkg",
            vec![
                requiring("1.0.0-preview", VersionNumber::new(2021, 1, 0)),
                requiring("2.0.0", VersionNumber::new(2023, 1, 0)),
            ],
        );
        assert_eq!(default_of(record, None), Some("1.0.0-preview".to_string()));
    }

    #[test]
    fn default_falls_back_to_incompatible_stable_then_anything() {
        let newer = VersionNumber::new(2024, 1, 0);
        let record = PackageRecord::new(
            "com.test.pkg",
            vec![requiring("2.0.0-preview", newer), requiring("1.0.0", newer)],
        );
        assert_eq!(default_of(record, None), Some("1.0.0".to_string()));

        let record = PackageRecord::new("com.test.pkg", vec![requiring("2.0.0-preview", newer)]);
        assert_eq!(default_of(record, None), Some("2.0.0-preview".to_string()));
    }

    #[test]
    fn finalize_drops_record_without_versions() {
        assert!(record(&[]).finalize(None, ENGINE).is_none());
    }

    #[test]
    fn finalize_drops_invalid_versions_but_keeps_record() {
        let mut broken = version("com.test.pkg", "0.5.0").metadata().clone();
        broken.title = String::new();

        let mut record = record(&["1.0.0"]);
        record.replace_version(VersionInfo::new(broken));

        let record = record.finalize(None, ENGINE).unwrap();
        assert_eq!(record.versions().len(), 1);
        assert_eq!(record.default_version().unwrap().version(), "1.0.0");
    }

    #[test]
    fn finalize_drops_record_whose_default_is_invalid() {
        let mut broken = version("com.test.pkg", "2.0.0").metadata().clone();
        broken.title = String::new();

        let mut record = record(&["1.0.0"]);
        record.replace_version(VersionInfo::new(broken));

        assert!(record.finalize(None, ENGINE).is_none());
    }

    #[test]
    fn finalize_drops_record_without_name() {
        let record = PackageRecord::new("", vec![version("com.test.pkg", "1.0.0")]);
        assert!(record.finalize(None, ENGINE).is_none());
    }

    #[test]
    fn replace_version_overwrites_same_version() {
        let mut record = record(&["1.0.0", "2.0.0"]);
        let mut local = version("com.test.pkg", "1.0.0").metadata().clone();
        local.description = "local edit".to_string();
        record.replace_version(VersionInfo::new(local));

        assert_eq!(record.versions().len(), 2);
        assert_eq!(record.version("1.0.0").unwrap().description(), "local edit");
    }

    #[test]
    fn deprecated_when_any_version_is_deprecated() {
        let mut meta = version("com.test.pkg", "1.0.0").metadata().clone();
        meta.keywords = vec!["deprecated".to_string()];
        let record = PackageRecord::new("com.test.pkg", vec![VersionInfo::new(meta)]);
        assert!(record.is_deprecated());
    }

    #[test]
    fn serialization_keeps_versions_and_verified_version() {
        let mut record = record(&["1.0.0"]);
        record.set_verified_version(Some("1.0.0".to_string()));

        let json = serde_json::to_string(&record).unwrap();
        let restored: PackageRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.name(), "com.test.pkg");
        assert_eq!(restored.verified_version(), Some("1.0.0"));
        assert_eq!(restored.versions().len(), 1);
        assert!(restored.default_version().is_none());
    }
}
