//! HTTP request handlers for the directory API.

use crate::http::SNAPSHOT_TIMESTAMP_HEADER;
use crate::server::AppState;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use findservers_directory::{CacheInfo, RefreshError, RefreshStats};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Handle GET /api/servers.
///
/// Returns the current snapshot as a JSON array; an empty array while the
/// cache is cold.
pub async fn handle_servers(State(state): State<Arc<AppState>>) -> Response {
    let Some(snapshot) = state.directory().snapshot() else {
        tracing::debug!("Serving empty list, cache is cold");
        return Json(json!([])).into_response();
    };

    tracing::debug!("Serving {} listings", snapshot.len());

    let mut response = Json(snapshot.listings()).into_response();
    if let Ok(value) = HeaderValue::from_str(&snapshot.created_at().to_rfc3339()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SNAPSHOT_TIMESTAMP_HEADER), value);
    }
    response
}

/// Handle POST /api/refresh-servers.
///
/// Runs a refresh cycle and waits for its outcome.
///
/// # Errors
///
/// Returns `AppError` if the caller is not authorized or the cycle did not publish.
pub async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let expected = state.refresh_token().ok_or(AppError::NotFound)?;

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if !tokens_match(provided.trim(), expected) {
        tracing::warn!("Rejected refresh request with invalid token");
        return Err(AppError::Unauthorized);
    }

    tracing::info!("On-demand refresh requested");
    let report = state.directory().trigger_refresh().await?;

    Ok(Json(json!({
        "status": "success",
        "count": report.listings,
        "timestamp": report.created_at,
    }))
    .into_response())
}

/// Response body for GET /api/cache-info.
#[derive(Debug, Serialize)]
pub struct CacheInfoResponse {
    pub cache: CacheInfo,
    pub refresh: RefreshStats,
    pub uptime_secs: u64,
}

/// Handle GET /api/cache-info.
pub async fn handle_cache_info(State(state): State<Arc<AppState>>) -> Json<CacheInfoResponse> {
    Json(CacheInfoResponse {
        cache: state.directory().info(),
        refresh: state.directory().stats(),
        uptime_secs: state.uptime_seconds(),
    })
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Application-level error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Endpoint disabled (404)
    NotFound,
    /// Missing or wrong bearer token (401)
    Unauthorized,
    /// Refresh cycle did not publish (409 or 503)
    Refresh(RefreshError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "status": "failure", "error": "Not found" }),
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "status": "failure", "error": "Unauthorized" }),
            ),
            Self::Refresh(err @ RefreshError::AlreadyRunning) => (
                StatusCode::CONFLICT,
                json!({ "status": "busy", "error": err.to_string() }),
            ),
            Self::Refresh(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "failure", "error": err.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        Self::Refresh(err)
    }
}
