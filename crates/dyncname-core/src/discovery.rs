//! Auto-discovery of record names from reverse-proxy routes
//!
//! For every route whose handler chain contains a reverse proxy, each literal
//! hostname of the route's host matchers becomes a record name in the
//! auto-discovery zone, with the `.<zone>` suffix stripped.
//!
//! Handlers are decoded into [`HandlerKind`] by their `"handler"`
//! discriminator. Unknown kinds are ignored; a payload that cannot be decoded
//! at all fails the whole step and no observation is returned.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domains::APEX;
use crate::error::{Error, Result};
use crate::routes::{Route, RouteTable};

/// Nesting limit for subroute handlers
const MAX_SUBROUTE_DEPTH: usize = 16;

/// A hostname seen on a live reverse-proxy route, mapped into a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteObservation {
    /// The auto-discovery zone
    pub zone: String,
    /// Record name derived from the host
    pub name: String,
}

impl RouteObservation {
    pub fn new(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
        }
    }

    /// Derive the observation for `host` in `zone`
    pub fn from_host(host: &str, zone: &str) -> Self {
        Self::new(zone, record_name_for_host(host, zone))
    }
}

/// Decoded handler, keyed by the `"handler"` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum HandlerKind {
    /// `reverse_proxy`: the only kind that contributes hosts
    ReverseProxy {
        #[serde(default)]
        upstreams: Vec<serde_json::Value>,
    },

    /// `subroute`: nested routes, walked with the enclosing hosts
    Subroute {
        #[serde(default)]
        routes: Vec<Route>,
    },

    /// Any other handler (file_server, static_response, headers, ...)
    #[serde(other)]
    Other,
}

impl HandlerKind {
    /// Decode a raw handler payload
    pub fn decode(raw: &serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        HandlerKind::deserialize(raw)
    }
}

/// Map a hostname to a record name within `zone`
///
/// `api.example.com` in `example.com` is `api`, `example.com` itself is the
/// apex. A host outside the zone is returned unchanged.
pub fn record_name_for_host(host: &str, zone: &str) -> String {
    if host == zone {
        return APEX.to_string();
    }

    match host.strip_suffix(zone).and_then(|rest| rest.strip_suffix('.')) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => {
            warn!(host = %host, zone = %zone, "Host is outside the auto-discovery zone, using it unchanged");
            host.to_string()
        }
    }
}

/// Collect observations for every reverse-proxied host in the table
///
/// Pure: the table is not modified and nothing is applied until the whole
/// table decoded successfully.
pub fn discover(table: &RouteTable, zone: &str) -> Result<Vec<RouteObservation>> {
    let mut observations = Vec::new();

    for (server_name, server) in &table.servers {
        walk_routes(server_name, &server.routes, &[], zone, 0, &mut observations)?;
    }

    debug!(zone = %zone, count = observations.len(), "Route discovery finished");
    Ok(observations)
}

fn walk_routes(
    server_name: &str,
    routes: &[Route],
    inherited_hosts: &[String],
    zone: &str,
    depth: usize,
    out: &mut Vec<RouteObservation>,
) -> Result<()> {
    if depth > MAX_SUBROUTE_DEPTH {
        return Err(Error::discovery(format!(
            "server {}: subroutes nested deeper than {}",
            server_name, MAX_SUBROUTE_DEPTH
        )));
    }

    for (index, route) in routes.iter().enumerate() {
        let mut hosts = inherited_hosts.to_vec();
        hosts.extend(route.hosts().map(str::to_string));

        for raw in &route.handlers {
            let kind = HandlerKind::decode(raw).map_err(|e| {
                Error::discovery(format!(
                    "failed to decode handler (server {}, route {}): {}",
                    server_name, index, e
                ))
            })?;

            match kind {
                HandlerKind::ReverseProxy { .. } => {
                    for host in &hosts {
                        let observation = RouteObservation::from_host(host, zone);
                        debug!(host = %host, name = %observation.name, "Found reverse-proxied host");
                        out.push(observation);
                    }
                }
                HandlerKind::Subroute { routes } => {
                    walk_routes(server_name, &routes, &hosts, zone, depth + 1, out)?;
                }
                HandlerKind::Other => {}
            }
        }
    }

    Ok(())
}
