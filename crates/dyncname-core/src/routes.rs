//! Route table snapshot
//!
//! These types follow the shape of Caddy's `apps.http` JSON:
//!
//! ```text
//! { "servers": { "srv0": { "routes": [
//!     { "match":  [ { "host": ["api.example.com"] } ],
//!       "handle": [ { "handler": "reverse_proxy", ... } ] }
//! ] } } }
//! ```
//!
//! Handlers are kept as raw JSON. They are only decoded during discovery,
//! where a malformed handler must fail the whole step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::traits::RouteSource;

/// Servers of the HTTP app, keyed by server name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    pub servers: BTreeMap<String, HttpServer>,
}

impl RouteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server (builder style)
    pub fn with_server(mut self, name: impl Into<String>, server: HttpServer) -> Self {
        self.servers.insert(name.into(), server);
        self
    }

    /// Parse the HTTP app object (`apps.http`)
    ///
    /// A JSON `null` is an HTTP app with no servers.
    pub fn from_http_app(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Extract the HTTP app from a full Caddy JSON config
    pub fn from_caddy_config(config: &serde_json::Value) -> Result<Self> {
        match config.pointer("/apps/http") {
            Some(http) => Self::from_http_app(http.clone()),
            None => Ok(Self::new()),
        }
    }

    /// Total number of top-level routes across servers
    pub fn route_count(&self) -> usize {
        self.servers.values().map(|s| s.routes.len()).sum()
    }
}

/// One HTTP server of the proxy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpServer {
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl HttpServer {
    /// Create a server from its routes
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }
}

/// A route: matcher sets plus the handler chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matcher_sets: Vec<MatcherSet>,

    /// Raw handler encodings, discriminated by their `"handler"` field
    #[serde(rename = "handle", default, skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<serde_json::Value>,
}

impl Route {
    /// Create an empty route
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a matcher set matching the given hosts
    pub fn match_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matcher_sets.push(MatcherSet::hosts(hosts));
        self
    }

    /// Append a raw handler
    pub fn handle(mut self, handler: serde_json::Value) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Literal hostnames of every host matcher on this route
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.matcher_sets
            .iter()
            .flat_map(|set| set.host.iter().map(String::as_str))
    }
}

/// One matcher set. Only the host matcher is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatcherSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    /// Matchers this crate does not look at (path, method, ...)
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl MatcherSet {
    /// A matcher set with only a host matcher
    pub fn hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host: hosts.into_iter().map(Into::into).collect(),
            other: serde_json::Map::new(),
        }
    }
}

/// Route source returning a fixed snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticRouteSource {
    table: RouteTable,
}

impl StaticRouteSource {
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl RouteSource for StaticRouteSource {
    async fn snapshot(&self) -> Result<RouteTable> {
        Ok(self.table.clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}
