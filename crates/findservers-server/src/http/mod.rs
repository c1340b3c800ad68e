//! HTTP server implementation using axum.

use crate::server::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod handlers;

/// Header carrying the publish time of the served snapshot.
pub const SNAPSHOT_TIMESTAMP_HEADER: &str = "x-snapshot-timestamp";

/// Create HTTP router with all endpoints.
///
/// Anything not matched by an API route is served from the public directory.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(state.public_dir());

    Router::new()
        .route("/api/servers", get(handlers::handle_servers))
        .route("/api/refresh-servers", post(handlers::handle_refresh))
        .route("/api/cache-info", get(handlers::handle_cache_info))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use findservers_directory::{Directory, DirectoryConfig};
    use std::path::PathBuf;

    #[test]
    fn test_router_creation() {
        let directory = Directory::from_config(DirectoryConfig::default(), None).unwrap();
        let state = Arc::new(AppState::new(directory, None, PathBuf::from("public")));
        let _router = create_router(state);
    }
}
