//! Version history routes.
//!
//! `GET /api/pages/{id}/versions/compare?from=&to=&strategy=` diffs two
//! versions by number. `strategy` defaults to `positional`, which pairs
//! components by slot: deleting one component reports every later slot as
//! modified and the last slot as removed. Pass `strategy=identity` to pair
//! components by id instead, which reports the deleted component as removed
//! and the rest as moved. The response echoes the strategy used.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use super::helpers::{Actor, Paging, RevisionBody};
use crate::content::{DiffStrategyKind, SavedPage, VersionDiff};
use crate::error::AppResult;
use crate::models::{PageVersion, VersionSummary};
use crate::state::AppState;

/// Create the version router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/pages/{id}/versions",
            get(list_versions).post(snapshot),
        )
        .route("/api/pages/{id}/versions/compare", get(compare))
        .route(
            "/api/pages/{id}/versions/{version_id}",
            get(get_version).delete(delete_version),
        )
        .route(
            "/api/pages/{id}/versions/{version_id}/restore",
            post(restore),
        )
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotRequest {
    #[serde(default)]
    note: Option<String>,
}

/// Query of the compare route; `strategy` is `positional` unless given.
#[derive(Debug, Deserialize)]
struct CompareQuery {
    from: i32,
    to: i32,
    #[serde(default)]
    strategy: DiffStrategyKind,
}

async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(paging): Query<Paging>,
) -> AppResult<Json<Vec<VersionSummary>>> {
    let limit = state.config().page_size(paging.limit);
    Ok(Json(
        state
            .pages()
            .list_versions(id, limit, paging.offset())
            .await?,
    ))
}

async fn snapshot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(body): Json<SnapshotRequest>,
) -> AppResult<(StatusCode, Json<PageVersion>)> {
    let version = state.pages().snapshot_page(id, actor, body.note).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

async fn get_version(
    State(state): State<AppState>,
    Path((id, version_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PageVersion>> {
    Ok(Json(state.pages().get_version(id, version_id).await?))
}

async fn delete_version(
    State(state): State<AppState>,
    Path((id, version_id)): Path<(Uuid, Uuid)>,
    Actor(_actor): Actor,
) -> AppResult<StatusCode> {
    state.pages().delete_version(id, version_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restore(
    State(state): State<AppState>,
    Path((id, version_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
    Json(body): Json<RevisionBody>,
) -> AppResult<Json<SavedPage>> {
    let saved = state
        .pages()
        .restore_version(id, version_id, body.revision, actor)
        .await?;
    Ok(Json(saved))
}

async fn compare(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CompareQuery>,
) -> AppResult<Json<VersionDiff>> {
    let diff = state
        .pages()
        .compare_versions(id, query.from, query.to, query.strategy)
        .await?;
    Ok(Json(diff))
}
