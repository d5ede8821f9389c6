// # Caddy Route Sources
//
// This crate provides the route table snapshots used by dyncname's
// auto-discovery of reverse-proxied hostnames.
//
// ## Sources
//
// - `caddy_admin`: live configuration from the Caddy admin API
//   (`GET {url}/config/apps/http`). This is the normal choice when dyncname
//   runs next to a Caddy instance.
// - `caddy_file`: a Caddy JSON config on disk (for example the output of
//   `caddy adapt`). Useful when the admin endpoint is disabled, and in CI.
//
// ## Snapshot Semantics
//
// Discovery runs exactly once at startup, so each source is read once.
// Nothing here polls or caches. Any failure to fetch or parse the snapshot is
// an `Error::RouteSource`, which aborts startup.

use async_trait::async_trait;
use dyncname_core::config::RouteSourceConfig;
use dyncname_core::registry::Registry;
use dyncname_core::routes::RouteTable;
use dyncname_core::traits::{RouteSource, RouteSourceFactory};
use dyncname_core::{Error, Result};

use std::path::PathBuf;
use std::time::Duration;

/// Admin API request timeout
const ADMIN_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Route source backed by the Caddy admin API
pub struct CaddyAdminRouteSource {
    /// Admin endpoint base URL (e.g. "http://localhost:2019")
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl CaddyAdminRouteSource {
    /// Create a new admin API source
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(ADMIN_REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// URL of the HTTP app config
    pub fn endpoint(&self) -> String {
        format!("{}/config/apps/http", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RouteSource for CaddyAdminRouteSource {
    async fn snapshot(&self) -> Result<RouteTable> {
        let endpoint = self.endpoint();
        tracing::debug!(endpoint = %endpoint, "Fetching Caddy HTTP app config");

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| Error::route_source(format!("Request to {} failed: {}", endpoint, e)))?;

        if !response.status().is_success() {
            return Err(Error::route_source(format!(
                "Caddy admin API returned {} for {}",
                response.status(),
                endpoint
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::route_source(format!("Invalid JSON from {}: {}", endpoint, e)))?;

        let table = RouteTable::from_http_app(body)
            .map_err(|e| Error::route_source(format!("Unexpected HTTP app shape: {}", e)))?;

        tracing::info!(
            servers = table.servers.len(),
            routes = table.route_count(),
            "Loaded route table from Caddy admin API"
        );
        Ok(table)
    }

    fn source_name(&self) -> &'static str {
        "caddy_admin"
    }
}

/// Route source backed by a Caddy JSON config file
#[derive(Debug, Clone)]
pub struct CaddyFileRouteSource {
    path: PathBuf,
}

impl CaddyFileRouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RouteSource for CaddyFileRouteSource {
    async fn snapshot(&self) -> Result<RouteTable> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::route_source(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let config: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            Error::route_source(format!("Invalid JSON in {}: {}", self.path.display(), e))
        })?;

        let table = RouteTable::from_caddy_config(&config)
            .map_err(|e| Error::route_source(format!("Unexpected HTTP app shape: {}", e)))?;

        tracing::info!(
            path = %self.path.display(),
            routes = table.route_count(),
            "Loaded route table from Caddy config file"
        );
        Ok(table)
    }

    fn source_name(&self) -> &'static str {
        "caddy_file"
    }
}

/// Factory for admin API sources
pub struct CaddyAdminFactory;

impl RouteSourceFactory for CaddyAdminFactory {
    fn create(&self, config: &RouteSourceConfig) -> Result<Box<dyn RouteSource>> {
        match config {
            RouteSourceConfig::CaddyAdmin { url } => Ok(Box::new(CaddyAdminRouteSource::new(url.clone()))),
            _ => Err(Error::config("Invalid config for Caddy admin route source")),
        }
    }
}

/// Factory for config file sources
pub struct CaddyFileFactory;

impl RouteSourceFactory for CaddyFileFactory {
    fn create(&self, config: &RouteSourceConfig) -> Result<Box<dyn RouteSource>> {
        match config {
            RouteSourceConfig::CaddyFile { path } => Ok(Box::new(CaddyFileRouteSource::new(path))),
            _ => Err(Error::config("Invalid config for Caddy file route source")),
        }
    }
}

/// Register both Caddy route sources with a registry
pub fn register(registry: &Registry) {
    registry.register_route_source("caddy_admin", Box::new(CaddyAdminFactory));
    registry.register_route_source("caddy_file", Box::new(CaddyFileFactory));
}
