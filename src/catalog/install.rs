//! Installing and removing packages through the synchronizer

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::sync::CatalogSynchronizer;
use crate::error::{CatalogError, ManifestError, SyncError};
use crate::host::ProjectManifest;
use crate::registry::types::PackageJson;
use crate::version::VersionInfo;

impl CatalogSynchronizer {
    /// Add `package_name` at `version` to the manifest.
    ///
    /// Every namespace the package could pull in is added to the registry's
    /// scopes first, using the conservative dependency closure of the current
    /// catalog.
    pub async fn install(
        &self,
        package_name: &str,
        version: &str,
        notify_changes: bool,
    ) -> Result<(), CatalogError> {
        let snapshot = self.query(false).await?;
        let namespaces = snapshot.transitive_namespaces_of(package_name);

        let (name, version_spec) = (package_name.to_string(), version.to_string());
        self.edit_manifest(move |manifest| {
            manifest.install(&name, &version_spec, namespaces.iter())
        })
        .await?;

        if let Some(observer) = &self.observer {
            observer.on_package_added(package_name);
        }
        if notify_changes {
            self.notify_changes().await?;
        }
        Ok(())
    }

    /// Install the package whose `package.json` is at `package_json_path`
    /// from its folder on disk
    pub async fn install_local(
        &self,
        package_json_path: &Path,
        notify_changes: bool,
    ) -> Result<(), CatalogError> {
        let contents = tokio::fs::read_to_string(package_json_path)
            .await
            .map_err(|source| ManifestError::Io {
                path: package_json_path.to_path_buf(),
                source,
            })?;
        let package: PackageJson =
            serde_json::from_str(&contents).map_err(|source| ManifestError::Json {
                path: package_json_path.to_path_buf(),
                source,
            })?;
        if package.name.is_empty() {
            return Err(ManifestError::MissingPackageName {
                path: package_json_path.to_path_buf(),
            }
            .into());
        }

        let package_dir = package_json_path.parent().unwrap_or(Path::new("."));
        let version = format!("file:{}", package_dir.display());
        info!(
            "Installing local package {} from {:?}",
            package.name, package_dir
        );

        self.install(&package.name, &version, notify_changes).await
    }

    /// Remove `package_name` from the manifest. Registry scopes are left alone.
    pub async fn uninstall(
        &self,
        package_name: &str,
        notify_changes: bool,
    ) -> Result<(), CatalogError> {
        let name = package_name.to_string();
        self.edit_manifest(move |manifest| manifest.uninstall(&name))
            .await?;

        if let Some(observer) = &self.observer {
            observer.on_package_removed(package_name);
        }
        if notify_changes {
            self.notify_changes().await?;
        }
        Ok(())
    }

    /// Run a manifest edit on the blocking pool
    async fn edit_manifest<F>(&self, edit: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&ProjectManifest) -> Result<(), ManifestError> + Send + 'static,
    {
        let manifest = self.manifest.clone();
        match tokio::task::spawn_blocking(move || edit(&manifest)).await {
            Ok(result) => Ok(result?),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Arc::new(SyncError::Interrupted).into()),
        }
    }

    /// Let the host resolve the edited manifest and drop the cached catalog
    pub async fn notify_changes(&self) -> Result<(), CatalogError> {
        debug!("Notifying host of manifest changes");
        self.host().resolve().await?;
        self.invalidate();
        Ok(())
    }

    /// One version of one package from the current catalog
    pub async fn version_info(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<VersionInfo, CatalogError> {
        let snapshot = self.query(false).await?;
        snapshot.version_info(package_name, version).cloned()
    }
}
