//! npm-compatible registry served by mockito

use std::sync::Arc;

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Map, Value, json};

use package_catalog::registry::{NpmRegistry, Registry};

/// One published version of a test package
pub struct Release<'a> {
    pub version: &'a str,
    pub unity: &'a str,
    pub dependencies: &'a [&'a str],
    pub keywords: &'a [&'a str],
    pub supported: bool,
    pub published: &'a str,
}

impl<'a> Release<'a> {
    pub fn new(version: &'a str) -> Self {
        Self {
            version,
            unity: "2021.3",
            dependencies: &[],
            keywords: &[],
            supported: true,
            published: "2024-01-01T00:00:00.000Z",
        }
    }

    fn to_json(&self, name: &str) -> Value {
        let dependencies: Map<String, Value> = self
            .dependencies
            .iter()
            .map(|d| (d.to_string(), json!("1.0.0")))
            .collect();
        json!({
            "name": name,
            "version": self.version,
            "displayName": format!("Display {name}"),
            "description": format!("Description of {name}"),
            "unity": self.unity,
            "author": { "name": "Test Author" },
            "keywords": self.keywords,
            "supported": self.supported,
            "dependencies": dependencies,
        })
    }
}

pub struct TestRegistry {
    server: ServerGuard,
}

impl TestRegistry {
    pub async fn start() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn client(&self) -> Arc<dyn Registry> {
        Arc::new(NpmRegistry::new(&self.server.url()).unwrap())
    }

    /// Registry root answered with `status`
    pub async fn mock_root(&mut self, status: usize) -> Mock {
        self.server
            .mock("GET", "/")
            .with_status(status)
            .with_body("{}")
            .create_async()
            .await
    }

    /// Registry-wide index listing `(name, latest version)` pairs
    pub async fn mock_index(&mut self, packages: &[(&str, &str)]) -> Mock {
        let objects: Vec<Value> = packages
            .iter()
            .map(|(name, latest)| {
                json!({
                    "package": {
                        "name": name,
                        "version": latest,
                        "dist-tags": { "latest": latest }
                    }
                })
            })
            .collect();

        self.server
            .mock("GET", "/-/v1/search")
            .match_query(Matcher::UrlEncoded("size".into(), "100000".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "objects": objects }).to_string())
            .expect(1)
            .create_async()
            .await
    }

    /// Full version history of one package, fetched exactly once
    pub async fn mock_package(&mut self, name: &str, releases: &[Release<'_>]) -> Mock {
        let versions: Map<String, Value> = releases
            .iter()
            .map(|r| (r.version.to_string(), r.to_json(name)))
            .collect();
        let time: Map<String, Value> = releases
            .iter()
            .map(|r| (r.version.to_string(), json!(r.published)))
            .collect();

        self.server
            .mock("GET", format!("/{name}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "name": name, "versions": versions, "time": time }).to_string())
            .expect(1)
            .create_async()
            .await
    }
}
