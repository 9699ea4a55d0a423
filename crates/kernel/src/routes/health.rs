//! Health check endpoint.
//!
//! Returns 200 OK if the page store is reachable, 503 Service Unavailable
//! otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    store_healthy: bool,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.store_healthy().await;

    let (status, status_code) = if healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            store: state.store().backend(),
            store_healthy: healthy,
        }),
    )
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
