// # dyncname-core
//
// Core library keeping CNAME records on a remote DNS server in sync with a
// declared and discovered set of (zone, name) pairs.
//
// ## Architecture Overview
//
// - **DomainMap**: Desired state, seeded from configuration and augmented once
//   from live reverse-proxy routes
// - **RouteSource**: Trait for reading the proxy's route table
// - **RemoteShell**: Trait for running one command on the DNS server
// - **CnameUpdater**: Trait for updating one record; `ShellCnameUpdater`
//   builds the command and classifies its output
// - **Reconciler**: Timer-driven loop pushing every target each interval
// - **DynamicDnsApp**: Provision / start / stop lifecycle
// - **Registry**: Plugin-based registry for shells and route sources
//
// ## Design Principles
//
// 1. **Recompute, don't persist**: Desired state is rebuilt from live sources
// 2. **Fail fast on the target set**: Bad config or discovery stops startup
// 3. **Isolate each record**: One failed update never blocks the others
// 4. **One session at a time**: Targets are updated strictly sequentially
// 5. **Library-First**: The daemon is a thin layer over this crate

pub mod traits;
pub mod app;
pub mod config;
pub mod discovery;
pub mod domains;
pub mod engine;
pub mod error;
pub mod executor;
pub mod registry;
pub mod routes;

// Re-export core types for convenience
pub use traits::{CnameUpdater, RemoteShell, RouteSource};
pub use app::DynamicDnsApp;
pub use config::{AppConfig, DnsServerConfig, EngineConfig, RouteSourceConfig};
pub use discovery::{HandlerKind, RouteObservation};
pub use domains::{DomainMap, FrozenDomains, ReconciliationTarget};
pub use engine::{PassReport, Reconciler, ReconcilerEvent, TargetOutcome};
pub use error::{Error, Result};
pub use executor::{CnameCommand, ShellCnameUpdater};
pub use registry::Registry;
pub use routes::{RouteTable, StaticRouteSource};
