//! Error types for the refresh-and-cache engine
//!
//! Failures are split by the layer that absorbs them:
//! - [`FetchError`]: one upstream attempt for one shard. Retried, then absorbed
//!   by the fetcher, which yields an empty shard.
//! - [`StoreError`]: durable backend I/O. Logged by the cache store, never
//!   surfaced to readers or to the refresh caller.
//! - [`RefreshError`]: a whole refresh cycle. The only failure that changes
//!   externally observable behavior (the previous snapshot stays visible).

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// A single failed attempt against the upstream directory.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status: {0}")]
    HttpStatus(StatusCode),

    #[error("Rate limited")]
    RateLimited {
        /// Duration from the HTTP Retry-After header, if present
        retry_after: Option<Duration>,
    },

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl FetchError {
    /// Whether another attempt can plausibly succeed.
    ///
    /// Every upstream response, whatever its status, spends the retry budget.
    /// Only a URL that cannot be built fails the same way every time.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Http(_) | Self::HttpStatus(_) | Self::RateLimited { .. } | Self::Malformed(_) => {
                true
            }
            Self::InvalidEndpoint(_) => false,
        }
    }

    /// Get the Retry-After hint duration, if this is a rate-limited error with one.
    pub fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Durable backend failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status {
        /// Status returned by the backend
        status: StatusCode,
        /// Response body, for diagnostics
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid backend configuration: {0}")]
    InvalidConfiguration(String),
}

/// Refresh cycle failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// The merged listing count did not clear the viability threshold.
    #[error("Insufficient results: found {found}, need more than {required}")]
    InsufficientResults {
        /// Clean listings produced by the cycle
        found: usize,
        /// Count the cycle had to exceed
        required: usize,
    },

    /// Another cycle was already running; this trigger was coalesced into it.
    #[error("A refresh cycle is already running")]
    AlreadyRunning,
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
