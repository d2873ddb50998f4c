//! Install-state of packages reported by the host

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::host::{HostSource, InstalledPackage};
use crate::version::info::is_preview;

/// How a package ended up in the host project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSource {
    /// Listed in the project manifest
    Direct,
    /// Pulled in by another package
    Indirect,
    /// Lives inside the project's package folder
    Embedded,
    /// Referenced from a path on disk
    Local,
}

impl InstallSource {
    /// Every source, in declaration order
    pub const ALL: [InstallSource; 4] = [
        InstallSource::Direct,
        InstallSource::Indirect,
        InstallSource::Embedded,
        InstallSource::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallSource::Direct => "direct",
            InstallSource::Indirect => "indirect",
            InstallSource::Embedded => "embedded",
            InstallSource::Local => "local",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InstallSource::Direct => "Direct",
            InstallSource::Indirect => "Indirect",
            InstallSource::Embedded => "Embedded",
            InstallSource::Local => "Local",
        }
    }

    /// Only direct registry dependencies can be converted into embedded packages
    pub fn is_embeddable(&self) -> bool {
        matches!(self, InstallSource::Direct)
    }

    /// Classify a host-reported package
    pub fn classify(source: HostSource, is_direct: bool) -> Self {
        match source {
            HostSource::Embedded => InstallSource::Embedded,
            HostSource::Local | HostSource::LocalTarball => InstallSource::Local,
            _ if is_direct => InstallSource::Direct,
            _ => InstallSource::Indirect,
        }
    }
}

impl fmt::Display for InstallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(InstallSource::Direct),
            "indirect" => Ok(InstallSource::Indirect),
            "embedded" => Ok(InstallSource::Embedded),
            "local" => Ok(InstallSource::Local),
            _ => Err(()),
        }
    }
}

/// Install-state of one package in the host project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledInfo {
    pub installed_version: String,
    pub source: InstallSource,
    pub upgrade_version: Option<String>,
}

impl InstalledInfo {
    pub fn from_package(package: &InstalledPackage) -> Self {
        Self {
            installed_version: package.version.clone(),
            source: InstallSource::classify(package.source, package.is_direct),
            upgrade_version: upgrade_version(package),
        }
    }
}

/// Compute the version an installed package should be upgraded to, if any.
///
/// `compatible_versions` is ordered oldest to newest. Packages installed from
/// disk (embedded, local, tarball) or from an unknown source never upgrade, and
/// neither does a package already at its verified version. A verified version
/// newer than the installed one wins. Otherwise the compatible list is scanned
/// from newest down to the installed version. Preview candidates are only
/// acceptable when the installed version is itself a preview, and in that case
/// the newest preview candidate is preferred over a newer stable one so the
/// package stays on its preview track.
pub fn upgrade_version(package: &InstalledPackage) -> Option<String> {
    if matches!(
        package.source,
        HostSource::Embedded | HostSource::Local | HostSource::LocalTarball | HostSource::Unknown
    ) {
        return None;
    }

    let installed = package.version.as_str();
    let compatible = &package.compatible_versions;

    if let Some(verified) = package.verified_version.as_deref().filter(|v| !v.is_empty()) {
        if verified == installed {
            return None;
        }

        let position = |version: &str| compatible.iter().position(|v| v == version);
        let verified_index = position(verified);
        if verified_index.is_some() && verified_index > position(installed) {
            return Some(verified.to_string());
        }
    }

    let installed_is_preview = is_preview(installed);
    let mut stable_candidate = None;

    for candidate in compatible.iter().rev() {
        if candidate == installed {
            break;
        }

        if is_preview(candidate) {
            if installed_is_preview {
                return Some(candidate.clone());
            }
        } else if stable_candidate.is_none() {
            if !installed_is_preview {
                return Some(candidate.clone());
            }
            stable_candidate = Some(candidate.clone());
        }
    }

    stable_candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn installed(
        version: &str,
        source: HostSource,
        compatible: &[&str],
        verified: Option<&str>,
    ) -> InstalledPackage {
        InstalledPackage {
            name: "com.test.pkg".to_string(),
            version: version.to_string(),
            source,
            is_direct: true,
            compatible_versions: compatible.iter().map(|v| v.to_string()).collect(),
            verified_version: verified.map(String::from),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(HostSource::Embedded)]
    #[case(HostSource::Local)]
    #[case(HostSource::LocalTarball)]
    #[case(HostSource::Unknown)]
    fn upgrade_version_is_none_for_disk_and_unknown_sources(#[case] source: HostSource) {
        let package = installed("1.0.0", source, &["1.0.0", "2.0.0"], None);
        assert_eq!(upgrade_version(&package), None);
    }

    #[test]
    fn upgrade_version_is_none_when_installed_is_verified() {
        let package = installed("1.0.0", HostSource::Registry, &["1.0.0", "2.0.0"], Some("1.0.0"));
        assert_eq!(upgrade_version(&package), None);
    }

    #[test]
    fn upgrade_version_prefers_newer_verified_version() {
        let package = installed(
            "1.0.0",
            HostSource::Registry,
            &["1.0.0", "1.5.0", "2.0.0"],
            Some("1.5.0"),
        );
        assert_eq!(upgrade_version(&package), Some("1.5.0".to_string()));
    }

    #[test]
    fn upgrade_version_ignores_older_verified_version() {
        let package = installed(
            "1.5.0",
            HostSource::Registry,
            &["1.0.0", "1.5.0", "2.0.0"],
            Some("1.0.0"),
        );
        assert_eq!(upgrade_version(&package), Some("2.0.0".to_string()));
    }

    #[rstest]
    #[case("1.0.0", &["1.0.0", "1.1.0-preview", "1.1.0"], Some("1.1.0"))]
    #[case("1.0.0", &["1.0.0", "1.1.0-preview"], None)]
    #[case("1.1.0", &["1.0.0", "1.1.0"], None)]
    #[case("1.0.0-preview", &["1.0.0-preview", "1.1.0-preview", "1.1.0"], Some("1.1.0-preview"))]
    #[case("1.0.0-preview", &["1.0.0-preview", "1.0.0"], Some("1.0.0"))]
    #[case("0.9.0", &[], None)]
    fn upgrade_version_scans_compatible_versions(
        #[case] version: &str,
        #[case] compatible: &[&str],
        #[case] expected: Option<&str>,
    ) {
        let package = installed(version, HostSource::Registry, compatible, None);
        assert_eq!(upgrade_version(&package), expected.map(String::from));
    }

    #[rstest]
    #[case(HostSource::Registry, true, InstallSource::Direct)]
    #[case(HostSource::Git, false, InstallSource::Indirect)]
    #[case(HostSource::Embedded, true, InstallSource::Embedded)]
    #[case(HostSource::LocalTarball, true, InstallSource::Local)]
    fn classify_maps_host_sources(
        #[case] source: HostSource,
        #[case] is_direct: bool,
        #[case] expected: InstallSource,
    ) {
        assert_eq!(InstallSource::classify(source, is_direct), expected);
    }

    #[test]
    fn install_source_round_trips_through_str() {
        for source in InstallSource::ALL {
            assert_eq!(source.as_str().parse::<InstallSource>(), Ok(source));
        }
        assert!(InstallSource::Direct.is_embeddable());
        assert!(!InstallSource::Indirect.is_embeddable());
    }
}
