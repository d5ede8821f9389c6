//! Error types for the dyncname system
//!
//! Errors fall into two groups. Configuration and discovery errors corrupt the
//! set of reconciliation targets and are fatal at startup. Transport, session
//! and rejected-update errors concern a single target and are only logged.

use thiserror::Error;

/// Result type alias for dyncname operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dyncname system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (invalid interval, missing credentials, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Route table inspection failed (malformed handler encoding)
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Could not reach or authenticate against the remote host
    #[error("Transport error: {0}")]
    Transport(String),

    /// Session opened but the command could not be dispatched
    #[error("Session error: {0}")]
    Session(String),

    /// Command ran but its output carried the error marker
    #[error("DNS record update failed: {output}")]
    UpdateRejected {
        /// Combined output of the remote command
        output: String,
    },

    /// Route source could not produce a snapshot
    #[error("Route source error: {0}")]
    RouteSource(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a rejected-update error carrying the remote output
    pub fn update_rejected(output: impl Into<String>) -> Self {
        Self::UpdateRejected {
            output: output.into(),
        }
    }

    /// Create a route source error
    pub fn route_source(msg: impl Into<String>) -> Self {
        Self::RouteSource(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error invalidates the target set and must stop startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Discovery(_) | Self::RouteSource(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
