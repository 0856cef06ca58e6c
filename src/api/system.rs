//! System API endpoints: status and health.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, SystemStatus};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
}

/// Returns runtime status of the service.
///
/// # Endpoint
/// `GET /api/system/status`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let database_ok = state.store().ping().await.is_ok();
    let users = state.store().users().count().await?;

    let status = SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        database_ok,
        users,
        query_cache: state.shared.query_cache.stats().await,
        rate_limited_clients: state.shared.rate_limiter.tracked_clients(),
        access_window: state.shared.access_window.map(|w| w.to_string()),
        event_subscribers: state.event_bus().receiver_count(),
    };

    Ok(Json(ApiResponse::success(status)))
}

/// Liveness plus database reachability.
///
/// # Endpoint
/// `GET /api/health` (no authentication)
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.store().ping().await.is_ok();
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database { "ok" } else { "degraded" },
            database,
        }),
    )
}
