//! Plugin-based registry
//!
//! Remote shells and route sources register a factory under a type name;
//! the daemon then builds them from configuration without hardcoded
//! if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dyncname_core::registry::Registry;
//!
//! let registry = Registry::new();
//! dyncname_ssh::register(&registry);
//! dyncname_caddy::register(&registry);
//!
//! let shell = registry.create_shell(&config.dns_server)?;
//! ```

use crate::config::{DnsServerConfig, RouteSourceConfig};
use crate::error::{Error, Result};
use crate::traits::{RemoteShell, RemoteShellFactory, RouteSource, RouteSourceFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of shell and route source factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct Registry {
    /// Registered remote shell factories
    shells: RwLock<HashMap<String, Arc<dyn RemoteShellFactory>>>,

    /// Registered route source factories
    route_sources: RwLock<HashMap<String, Arc<dyn RouteSourceFactory>>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a remote shell factory
    ///
    /// # Parameters
    ///
    /// - `name`: Shell type name, matched against `dns_server.type`
    /// - `factory`: Factory object for creating shell instances
    pub fn register_shell(&self, name: impl Into<String>, factory: Box<dyn RemoteShellFactory>) {
        let mut shells = self.shells.write().unwrap_or_else(|e| e.into_inner());
        shells.insert(name.into(), Arc::from(factory));
    }

    /// Register a route source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Route source type name (e.g., "caddy_admin")
    /// - `factory`: Factory object for creating route source instances
    pub fn register_route_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RouteSourceFactory>,
    ) {
        let mut sources = self.route_sources.write().unwrap_or_else(|e| e.into_inner());
        sources.insert(name.into(), Arc::from(factory));
    }

    /// Create a remote shell from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RemoteShell>)`: Created shell instance
    /// - `Err(Error)`: If the shell type is not registered or creation fails
    pub fn create_shell(&self, config: &DnsServerConfig) -> Result<Box<dyn RemoteShell>> {
        let factory = {
            let shells = self.shells.read().unwrap_or_else(|e| e.into_inner());
            shells.get(&config.shell_type).cloned()
        };

        let factory = factory.ok_or_else(|| {
            Error::config(format!(
                "Remote shell type '{}' is not registered",
                config.shell_type
            ))
        })?;

        factory.create(config)
    }

    /// Create a route source from configuration
    pub fn create_route_source(&self, config: &RouteSourceConfig) -> Result<Box<dyn RouteSource>> {
        config.validate()?;

        let type_name = config.type_name();
        let factory = {
            let sources = self.route_sources.read().unwrap_or_else(|e| e.into_inner());
            sources.get(type_name).cloned()
        };

        let factory = factory.ok_or_else(|| {
            Error::config(format!("Route source type '{}' is not registered", type_name))
        })?;

        factory.create(config)
    }

    /// Check if a shell type is registered
    pub fn has_shell(&self, name: &str) -> bool {
        self.shells
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Check if a route source type is registered
    pub fn has_route_source(&self, name: &str) -> bool {
        self.route_sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// List registered shell types
    pub fn list_shells(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shells
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// List registered route source types
    pub fn list_route_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .route_sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
