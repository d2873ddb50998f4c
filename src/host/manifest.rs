//! Editing the project's dependency manifest

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::ManifestError;

const MANIFEST_PATH: &str = "Packages/manifest.json";

/// `Packages/manifest.json`.
///
/// Dependencies and unknown fields keep their order across a round trip, but
/// `dependencies` and `scopedRegistries` are always written first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(
        rename = "scopedRegistries",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scoped_registries: Option<Vec<ScopedRegistry>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopedRegistry {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Manifest {
    /// Scopes of the scoped registry whose url contains `url_snippet`
    pub fn registry_scopes_mut(
        &mut self,
        url_snippet: &str,
    ) -> Result<&mut Vec<String>, ManifestError> {
        let registry = self
            .scoped_registries
            .as_mut()
            .ok_or(ManifestError::MissingScopedRegistries)?
            .iter_mut()
            .find(|r| r.url.contains(url_snippet))
            .ok_or_else(|| ManifestError::RegistryNotFound(url_snippet.to_string()))?;

        let url = registry.url.clone();
        registry
            .scopes
            .as_mut()
            .ok_or(ManifestError::MissingScopes(url))
    }
}

/// The manifest of one project, bound to the scoped registry this catalog serves
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    path: PathBuf,
    registry_snippet: String,
}

impl ProjectManifest {
    pub fn new(project_dir: &Path, registry_snippet: impl Into<String>) -> Self {
        Self::at_path(project_dir.join(MANIFEST_PATH), registry_snippet)
    }

    pub fn at_path(path: impl Into<PathBuf>, registry_snippet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            registry_snippet: registry_snippet.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, failing unless the registry's scope list exists
    pub fn load(&self) -> Result<Manifest, ManifestError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&contents).map_err(|source| ManifestError::Json {
                path: self.path.clone(),
                source,
            })?;
        manifest.registry_scopes_mut(&self.registry_snippet)?;
        Ok(manifest)
    }

    fn write(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(manifest).map_err(|source| ManifestError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json + "\n").map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Add or replace a dependency, adding any missing registry scopes first
    pub fn install<I>(&self, package_name: &str, version: &str, namespaces: I) -> Result<(), ManifestError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        info!("Installing package {} at version {}", package_name, version);

        let mut manifest = self.load()?;
        let scopes = manifest.registry_scopes_mut(&self.registry_snippet)?;
        for namespace in namespaces {
            let namespace = namespace.as_ref();
            if scopes.iter().any(|s| s == namespace) {
                info!(
                    "Not adding namespace {} because it was already present",
                    namespace
                );
            } else {
                info!(
                    "Adding namespace {} because it is required to install {}",
                    namespace, package_name
                );
                scopes.push(namespace.to_string());
            }
        }

        // Existing entries move to the end, like a fresh install
        manifest.dependencies.shift_remove(package_name);
        manifest
            .dependencies
            .insert(package_name.to_string(), version.to_string());

        self.write(&manifest)
    }

    pub fn uninstall(&self, package_name: &str) -> Result<(), ManifestError> {
        info!("Uninstalling package {}", package_name);

        let mut manifest = self.load()?;
        manifest.dependencies.shift_remove(package_name);
        self.write(&manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SNIPPET: &str = "registry.example.com";

    fn manifest_with(dir: &TempDir, json: &str) -> ProjectManifest {
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, json).unwrap();
        ProjectManifest::at_path(path, SNIPPET)
    }

    fn valid_manifest(dir: &TempDir) -> ProjectManifest {
        manifest_with(
            dir,
            r#"{
                "dependencies": {
                    "com.unity.ugui": "1.0.0",
                    "com.acme.tools": "0.1.0"
                },
                "scopedRegistries": [
                    { "name": "Other", "url": "https://other.example.com", "scopes": ["org.other"] },
                    { "name": "Acme", "url": "https://registry.example.com/", "scopes": ["com.acme"] }
                ],
                "testables": ["com.acme.tools"]
            }"#,
        )
    }

    #[test]
    fn install_adds_dependency_and_missing_namespaces() {
        let dir = TempDir::new().unwrap();
        let project = valid_manifest(&dir);

        project
            .install("com.acme.widgets", "2.0.0", ["com.acme", "com.widgets"])
            .unwrap();

        let mut manifest = project.load().unwrap();
        assert_eq!(
            manifest.dependencies.get("com.acme.widgets"),
            Some(&"2.0.0".to_string())
        );
        assert_eq!(
            manifest.registry_scopes_mut(SNIPPET).unwrap(),
            &vec!["com.acme".to_string(), "com.widgets".to_string()]
        );
        assert!(manifest.extra.contains_key("testables"));
    }

    #[test]
    fn install_replaces_existing_version() {
        let dir = TempDir::new().unwrap();
        let project = valid_manifest(&dir);

        project
            .install("com.acme.tools", "0.2.0", Vec::<String>::new())
            .unwrap();

        let manifest = project.load().unwrap();
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(
            manifest.dependencies.get_index(1),
            Some((&"com.acme.tools".to_string(), &"0.2.0".to_string()))
        );
    }

    #[test]
    fn rewrite_puts_known_fields_before_unknown_ones() {
        let dir = TempDir::new().unwrap();
        let project = manifest_with(
            &dir,
            r#"{
                "enableLockFile": true,
                "dependencies": { "com.unity.ugui": "1.0.0", "com.acme.tools": "0.1.0" },
                "testables": ["com.acme.tools"],
                "scopedRegistries": [
                    { "name": "Acme", "url": "https://registry.example.com/", "scopes": ["com.acme"] }
                ],
                "resolutionStrategy": "highestPatch"
            }"#,
        );

        project.uninstall("com.unity.ugui").unwrap();

        let written = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
        let position = |key: &str| written.find(&format!("\"{key}\"")).unwrap();
        assert!(position("dependencies") < position("scopedRegistries"));
        assert!(position("scopedRegistries") < position("enableLockFile"));
        assert!(position("enableLockFile") < position("testables"));
        assert!(position("testables") < position("resolutionStrategy"));

        let value: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["scopedRegistries"][0]["name"], "Acme");
    }

    #[test]
    fn uninstall_removes_dependency() {
        let dir = TempDir::new().unwrap();
        let project = valid_manifest(&dir);

        project.uninstall("com.unity.ugui").unwrap();

        let manifest = project.load().unwrap();
        assert!(!manifest.dependencies.contains_key("com.unity.ugui"));
        assert!(manifest.dependencies.contains_key("com.acme.tools"));
    }

    #[test]
    fn load_fails_without_scoped_registries() {
        let dir = TempDir::new().unwrap();
        let project = manifest_with(&dir, r#"{ "dependencies": {} }"#);
        assert!(matches!(
            project.uninstall("com.acme.tools"),
            Err(ManifestError::MissingScopedRegistries)
        ));
    }

    #[test]
    fn load_fails_when_registry_is_missing() {
        let dir = TempDir::new().unwrap();
        let project = manifest_with(
            &dir,
            r#"{ "dependencies": {}, "scopedRegistries": [{ "url": "https://elsewhere.com", "scopes": [] }] }"#,
        );
        assert!(matches!(
            project.load(),
            Err(ManifestError::RegistryNotFound(_))
        ));
    }

    #[test]
    fn install_fails_when_scopes_are_missing() {
        let dir = TempDir::new().unwrap();
        let project = manifest_with(
            &dir,
            r#"{ "dependencies": {}, "scopedRegistries": [{ "url": "https://registry.example.com" }] }"#,
        );
        assert!(matches!(
            project.install("com.acme.x", "1.0.0", ["com.acme"]),
            Err(ManifestError::MissingScopes(_))
        ));
    }
}
