//! Host projects on disk and an in-memory host

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use package_catalog::error::HostError;
use package_catalog::host::{HostInventory, InstalledPackage};
use package_catalog::version::VersionNumber;

/// A project directory with an engine version, a manifest bound to one
/// scoped registry and an optional lockfile
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new(editor_version: &str, registry_url: &str, scopes: &[&str]) -> Self {
        let project = Self {
            dir: TempDir::new().unwrap(),
        };
        project.write(
            "ProjectSettings/ProjectVersion.txt",
            &format!("m_EditorVersion: {editor_version}\nm_EditorVersionWithRevision: {editor_version} (abc)\n"),
        );
        project.write(
            "Packages/manifest.json",
            &serde_json::to_string_pretty(&json!({
                "dependencies": {},
                "scopedRegistries": [
                    { "name": "Test", "url": registry_url, "scopes": scopes }
                ]
            }))
            .unwrap(),
        );
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("net-cache")
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// Write `Packages/packages-lock.json` from `(name, version, depth, source)` entries
    pub fn lock(&self, entries: &[(&str, &str, u32, &str)]) {
        let dependencies: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(name, version, depth, source)| {
                (
                    name.to_string(),
                    json!({ "version": version, "depth": depth, "source": source }),
                )
            })
            .collect();
        self.write(
            "Packages/packages-lock.json",
            &json!({ "dependencies": dependencies }).to_string(),
        );
    }

    pub fn manifest(&self) -> Value {
        let contents =
            std::fs::read_to_string(self.dir.path().join("Packages/manifest.json")).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    pub fn scopes(&self) -> Vec<String> {
        self.manifest()["scopedRegistries"][0]["scopes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap().to_string())
            .collect()
    }
}

/// Host whose installed packages are set directly by the test
pub struct FakeHost {
    engine_version: VersionNumber,
    packages: Mutex<Vec<InstalledPackage>>,
    resolves: AtomicUsize,
}

impl FakeHost {
    pub fn new(engine_version: VersionNumber, packages: Vec<InstalledPackage>) -> Self {
        Self {
            engine_version,
            packages: Mutex::new(packages),
            resolves: AtomicUsize::new(0),
        }
    }

    pub fn set_installed(&self, packages: Vec<InstalledPackage>) {
        *self.packages.lock().unwrap() = packages;
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostInventory for FakeHost {
    fn engine_version(&self) -> VersionNumber {
        self.engine_version
    }

    async fn list_installed(&self) -> Result<Vec<InstalledPackage>, HostError> {
        Ok(self.packages.lock().unwrap().clone())
    }

    async fn resolve(&self) -> Result<(), HostError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
