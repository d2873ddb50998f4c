//! npm-compatible registry API implementation

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::catalog::record::PackageRecord;
use crate::config::{DEFAULT_REGISTRY_URL, SEARCH_PAGE_SIZE};
use crate::error::RegistryError;
use crate::registry::Registry;
use crate::registry::types::{IndexEntry, PackageDocument, SearchResponse};
use crate::version::VersionInfo;

/// Registry implementation for npm-compatible servers
pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl NpmRegistry {
    /// Creates a new NpmRegistry with a custom base URL
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("package-catalog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_default_url() -> Result<Self, RegistryError> {
        Self::new(DEFAULT_REGISTRY_URL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON document, mapping 404 to `NotFound` for `subject`
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        subject: &str,
    ) -> Result<T, RegistryError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(subject.to_string()));
        }

        if !status.is_success() {
            warn!("Registry returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse registry response from {}: {}", url, e);
            RegistryError::InvalidResponse(e.to_string())
        })
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

#[async_trait::async_trait]
impl Registry for NpmRegistry {
    async fn ping(&self) -> Result<(), RegistryError> {
        let url = format!("{}/", self.base_url);
        let status = self.client.get(&url).send().await?.status();

        if !status.is_success() {
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }
        Ok(())
    }

    async fn fetch_index(&self) -> Result<Vec<IndexEntry>, RegistryError> {
        let url = format!("{}/-/v1/search?size={}", self.base_url, SEARCH_PAGE_SIZE);
        let response: SearchResponse = self.get_json(&url, "index").await?;

        let entries: Vec<IndexEntry> = response
            .objects
            .into_iter()
            .filter_map(|object| {
                let latest = object.package.latest_version()?.to_string();
                Some(IndexEntry {
                    name: object.package.name,
                    latest_version: latest,
                })
            })
            .collect();

        debug!("Registry index lists {} packages", entries.len());
        Ok(entries)
    }

    async fn fetch_package(&self, package_name: &str) -> Result<PackageRecord, RegistryError> {
        let url = format!("{}/{}", self.base_url, package_name);
        let document: PackageDocument = self.get_json(&url, package_name).await?;

        let time = document.time;
        let versions = document
            .versions
            .into_iter()
            .map(|(version, json)| {
                let published = time
                    .get(&version)
                    .and_then(|t| t.as_str())
                    .and_then(parse_time);
                VersionInfo::new(json.into_metadata(package_name, &version, published))
            })
            .collect();

        let name = if document.name.is_empty() {
            package_name.to_string()
        } else {
            document.name
        };

        Ok(PackageRecord::new(name, versions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn ping_succeeds_on_ok_status() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        registry.ping().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn ping_fails_on_server_error() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        assert!(matches!(
            registry.ping().await,
            Err(RegistryError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn fetch_index_reads_latest_tags() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/-/v1/search")
            .match_query(Matcher::UrlEncoded("size".into(), "100000".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "objects": [
                        { "package": { "name": "com.test.a", "dist-tags": { "latest": "1.2.0" } } },
                        { "package": { "name": "com.test.b", "version": "0.1.0" } },
                        { "package": { "name": "com.test.c" } }
                    ]
                }"#,
            )
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        let index = registry.fetch_index().await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            index,
            vec![
                IndexEntry {
                    name: "com.test.a".to_string(),
                    latest_version: "1.2.0".to_string(),
                },
                IndexEntry {
                    name: "com.test.b".to_string(),
                    latest_version: "0.1.0".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn fetch_package_reads_versions_and_publish_times() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/com.test.widgets")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "name": "com.test.widgets",
                    "versions": {
                        "1.0.0": { "displayName": "[Test] Widgets", "unity": "2021.3" },
                        "1.1.0-preview": { "displayName": "Widgets", "keywords": ["ui"] }
                    },
                    "time": {
                        "created": "2023-01-01T00:00:00.000Z",
                        "1.0.0": "2023-01-02T10:00:00.000Z"
                    }
                }"#,
            )
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        let record = registry.fetch_package("com.test.widgets").await.unwrap();

        mock.assert_async().await;
        assert_eq!(record.name(), "com.test.widgets");
        assert_eq!(record.versions().len(), 2);

        let stable = record.version("1.0.0").unwrap();
        assert_eq!(stable.title(), "Test Widgets");
        assert_eq!(stable.package_name(), "com.test.widgets");
        assert_eq!(
            stable.date_published().map(|d| d.to_rfc3339()),
            Some("2023-01-02T10:00:00+00:00".to_string())
        );

        let preview = record.version("1.1.0-preview").unwrap();
        assert!(preview.is_preview());
        assert!(preview.date_published().is_none());
    }

    #[tokio::test]
    async fn fetch_package_keeps_versions_with_null_fields() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/com.test.sparse")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "name": "com.test.sparse",
                    "versions": {
                        "1.0.0": { "displayName": "Sparse", "description": null, "category": null },
                        "0.9.0": { "displayName": "Sparse", "keywords": null, "dependencies": null }
                    },
                    "time": {
                        "1.0.0": "2023-01-02T10:00:00.000Z",
                        "unpublished": { "time": "2023-02-01T00:00:00.000Z" }
                    }
                }"#,
            )
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        let record = registry.fetch_package("com.test.sparse").await.unwrap();

        assert_eq!(record.versions().len(), 2);
        let latest = record.version("1.0.0").unwrap();
        assert_eq!(latest.title(), "Sparse");
        assert_eq!(latest.description(), "");
        assert!(latest.date_published().is_some());
        assert!(record.version("0.9.0").unwrap().dependencies().is_empty());
    }

    #[tokio::test]
    async fn fetch_package_returns_not_found_for_nonexistent_package() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/com.test.missing")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Not found"}"#)
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        let result = registry.fetch_package("com.test.missing").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_package_rejects_malformed_body() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/com.test.broken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json")
            .create_async()
            .await;

        let registry = NpmRegistry::new(&server.url()).unwrap();
        assert!(matches!(
            registry.fetch_package("com.test.broken").await,
            Err(RegistryError::InvalidResponse(_))
        ));
    }
}
