//! findservers binary entry point.
//!
//! Parses configuration, initializes logging and runs the server until
//! Ctrl+C or SIGTERM.

use anyhow::Result;
use findservers_server::{LogFormat, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    tracing::info!(
        "Configuration loaded: HTTP={}, public={}, store={:?}",
        config.http_bind,
        config.public_dir.display(),
        config.store
    );

    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
