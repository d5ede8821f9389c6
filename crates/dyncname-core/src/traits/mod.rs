//! Core traits for the dyncname system
//!
//! This module defines the abstract interfaces at the edges of the engine.
//!
//! - [`RemoteShell`]: Run one command on the remote DNS authority
//! - [`CnameUpdater`]: Create or overwrite one CNAME record
//! - [`RouteSource`]: Read-only snapshot of the proxy route table

pub mod remote_shell;
pub mod cname_updater;
pub mod route_source;

pub use remote_shell::{RemoteShell, RemoteShellFactory};
pub use cname_updater::CnameUpdater;
pub use route_source::{RouteSource, RouteSourceFactory};
