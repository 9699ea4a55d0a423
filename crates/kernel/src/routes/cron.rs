//! Cron route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use tracing::{info, warn};

use crate::cron::TickSummary;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Create the cron router.
pub fn router() -> Router<AppState> {
    Router::new().route("/cron/{key}", post(run_cron))
}

/// Run the scheduler tick (protected by secret key).
async fn run_cron(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<TickSummary>> {
    if key != state.config().cron_key {
        warn!("invalid cron key");
        return Err(AppError::Forbidden);
    }

    info!("scheduler tick triggered via HTTP");
    let summary = state.scheduler().run().await?;
    Ok(Json(summary))
}
