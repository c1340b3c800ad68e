//! Server state management and orchestration.
//!
//! Owns the process lifecycle: restore the durable snapshot, make sure
//! readers have something to serve, start the refresh loop, serve HTTP,
//! and on shutdown stop the loop before returning.

use findservers_directory::Directory;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Shared application state for HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    directory: Directory,
    refresh_token: Option<String>,
    public_dir: PathBuf,
    started_at: SystemTime,
}

impl AppState {
    #[must_use]
    pub fn new(directory: Directory, refresh_token: Option<String>, public_dir: PathBuf) -> Self {
        Self {
            directory,
            refresh_token: refresh_token.filter(|token| !token.is_empty()),
            public_dir,
            started_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub const fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Token required by the refresh endpoint; `None` disables it.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Get server uptime in seconds.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Server orchestration.
pub struct Server {
    state: Arc<AppState>,
    config: ServerConfig,
}

impl Server {
    /// Create new server with configuration.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the configuration is invalid or the
    /// upstream client cannot be built.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let backend = config.backend()?;
        if let Some(backend) = &backend {
            tracing::info!("Snapshot store: {}", backend.name());
        }

        let directory = Directory::from_config(config.directory_config(), backend)?;
        let state = AppState::new(
            directory,
            config.refresh_token.clone(),
            config.public_dir.clone(),
        );

        if state.refresh_token().is_none() {
            tracing::info!("No refresh token configured, on-demand refresh disabled");
        }

        Ok(Self {
            state: Arc::new(state),
            config,
        })
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the HTTP server errors out.
    pub async fn run(self) -> Result<(), ServerError> {
        let bind_addr = self.config.http_bind;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ServerError::HttpBindFailed {
                addr: bind_addr,
                source,
            })?;

        tracing::info!("HTTP server listening on {}", bind_addr);
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the HTTP server errors out.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let directory = self.state.directory().clone();

        if directory.warm_start().await {
            // Stale data is served while the first cycle runs
            drop(directory.spawn_refresh());
        } else {
            tracing::info!("Cache is cold, running the first refresh before serving");
            if let Err(e) = directory.trigger_refresh().await {
                tracing::warn!("Initial refresh did not publish: {e}");
            }
        }

        let cancel = CancellationToken::new();
        let scheduler = directory.start(cancel.clone());

        let app = crate::http::create_router(Arc::clone(&self.state));
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Shutdown(format!("HTTP server error: {e}")));

        tracing::info!("Stopping refresh scheduler");
        cancel.cancel();
        if let Err(e) = scheduler.await {
            tracing::error!("Refresh scheduler task failed: {e}");
        }

        result
    }

    #[cfg(test)]
    #[must_use]
    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
