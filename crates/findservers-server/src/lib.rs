//! HTTP front end for the cached game server directory.
//!
//! # Architecture
//!
//! - `server`: process lifecycle (cold start, refresh loop, graceful shutdown)
//! - `config`: CLI and environment configuration
//! - `http`: routes and handlers
//!
//! The refresh-and-cache engine itself lives in `findservers-directory`.
//!
//! # Example
//!
//! ```no_run
//! use findservers_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = ServerConfig::from_args();
//!     let server = Server::new(config)?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Endpoints
//!
//! - `GET /api/servers` - current listings as a JSON array
//! - `POST /api/refresh-servers` - bearer-authenticated on-demand refresh
//! - `GET /api/cache-info` - snapshot age, TTL and refresh counters
//! - `GET /*` - static files from the public directory

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod http;
pub mod server;

pub use config::{LogFormat, ServerConfig, StoreKind};
pub use error::{ConfigError, ServerError};
pub use server::{AppState, Server};
