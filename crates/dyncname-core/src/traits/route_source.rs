// # Route Source Trait
//
// Read-only access to the reverse proxy's HTTP routing table.
//
// ## Implementations
//
// - Caddy admin API and Caddy JSON config file: `dyncname-caddy` crate
// - [`crate::routes::StaticRouteSource`]: fixed snapshot, for embedding and tests

use async_trait::async_trait;

use crate::routes::RouteTable;

/// Trait for route table providers
///
/// The snapshot is taken once at startup when auto-discovery is enabled.
/// Handlers inside it are left in their raw JSON form; decoding them is the
/// discovery step's job.
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Take a snapshot of servers, routes, handlers and matchers
    async fn snapshot(&self) -> Result<RouteTable, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing route sources from configuration
pub trait RouteSourceFactory: Send + Sync {
    /// Create a RouteSource instance from configuration
    fn create(
        &self,
        config: &crate::config::RouteSourceConfig,
    ) -> Result<Box<dyn RouteSource>, crate::Error>;
}
