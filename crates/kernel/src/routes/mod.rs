//! HTTP route handlers.

pub mod cron;
pub mod health;
pub mod helpers;
pub mod metrics;
pub mod page;
pub mod publishing;
pub mod version;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with request tracing and metrics.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .merge(cron::router())
        .merge(page::router())
        .merge(publishing::router())
        .merge(version::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics::track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
