//! Error types for the directory server.

use findservers_directory::{FetchError, StoreError};
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required configuration value
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Value present but unusable
    #[error("Invalid {name}: {reason}")]
    InvalidValue {
        /// Setting name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Durable backend could not be constructed
    #[error("Snapshot store configuration error: {0}")]
    Backend(#[from] StoreError),
}

/// Server runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind HTTP server
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    HttpBindFailed {
        /// Address that failed to bind
        addr: std::net::SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Upstream client could not be constructed
    #[error("Upstream client error: {0}")]
    Upstream(#[from] FetchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server shutdown error
    #[error("Server shutdown error: {0}")]
    Shutdown(String),
}
