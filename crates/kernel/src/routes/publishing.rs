//! Lifecycle and approval workflow routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use super::helpers::{Actor, Paging};
use crate::content::{ApprovalOutcome, OverduePage, TransitionRequest};
use crate::error::AppResult;
use crate::models::{Page, PendingApproval, PublishingWorkflow};
use crate::state::AppState;

/// Create the publishing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pages/{id}/publish", post(publish))
        .route("/api/pages/{id}/unpublish", post(unpublish))
        .route("/api/pages/{id}/schedule", post(schedule))
        .route("/api/pages/{id}/cancel-schedule", post(cancel_schedule))
        .route("/api/pages/{id}/archive", post(archive))
        .route(
            "/api/pages/{id}/workflow",
            get(get_workflow).put(upsert_workflow),
        )
        .route("/api/pages/{id}/workflow/request", post(request_approval))
        .route("/api/pages/{id}/workflow/approve", post(approve))
        .route("/api/pages/{id}/workflow/reject", post(reject))
        .route("/api/workflow/pending", get(list_pending))
        .route("/api/schedule", get(list_scheduled))
        .route("/api/schedule/overdue", get(list_overdue))
}

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    scheduled_for: i64,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRequest {
    requires_approval: bool,
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    reason: String,
}

async fn transition(
    state: &AppState,
    id: Uuid,
    request: TransitionRequest,
    actor: Uuid,
) -> AppResult<Json<Page>> {
    Ok(Json(
        state.publishing().transition(id, request, actor).await?,
    ))
}

async fn publish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> AppResult<Json<Page>> {
    transition(&state, id, TransitionRequest::Publish, actor).await
}

async fn unpublish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> AppResult<Json<Page>> {
    transition(&state, id, TransitionRequest::Unpublish, actor).await
}

async fn schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<ScheduleRequest>,
) -> AppResult<Json<Page>> {
    let request = TransitionRequest::Schedule {
        scheduled_for: request.scheduled_for,
        expires_at: request.expires_at,
    };
    transition(&state, id, request, actor).await
}

async fn cancel_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> AppResult<Json<Page>> {
    transition(&state, id, TransitionRequest::CancelSchedule, actor).await
}

async fn archive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> AppResult<Json<Page>> {
    transition(&state, id, TransitionRequest::Archive, actor).await
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublishingWorkflow>> {
    Ok(Json(state.publishing().get_workflow(id).await?))
}

async fn upsert_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<WorkflowRequest>,
) -> AppResult<Json<PublishingWorkflow>> {
    let wf = state
        .publishing()
        .upsert_workflow(id, request.requires_approval, actor)
        .await?;
    Ok(Json(wf))
}

async fn request_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> AppResult<Json<PublishingWorkflow>> {
    Ok(Json(state.publishing().request_approval(id, actor).await?))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> AppResult<Json<ApprovalOutcome>> {
    Ok(Json(state.publishing().approve(id, actor).await?))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<RejectRequest>,
) -> AppResult<Json<PublishingWorkflow>> {
    Ok(Json(
        state.publishing().reject(id, actor, &request.reason).await?,
    ))
}

async fn list_pending(State(state): State<AppState>) -> AppResult<Json<Vec<PendingApproval>>> {
    Ok(Json(state.publishing().list_pending_approvals().await?))
}

async fn list_scheduled(
    State(state): State<AppState>,
    Query(paging): Query<Paging>,
) -> AppResult<Json<Vec<Page>>> {
    let limit = state.config().page_size(paging.limit);
    Ok(Json(
        state
            .publishing()
            .list_scheduled(limit, paging.offset())
            .await?,
    ))
}

async fn list_overdue(State(state): State<AppState>) -> AppResult<Json<Vec<OverduePage>>> {
    let now = chrono::Utc::now().timestamp();
    Ok(Json(state.publishing().list_overdue_scheduled(now).await?))
}
