//! Page and component routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use super::helpers::Actor;
use crate::content::SavedPage;
use crate::error::AppResult;
use crate::models::{ComponentInput, CreatePage, Page, PageComponent, PageFilter, UpdatePage};
use crate::state::AppState;

/// Create the page router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pages", get(list_pages).post(create_page))
        .route(
            "/api/pages/{id}",
            get(get_page).patch(update_page).delete(delete_page),
        )
        .route("/api/pages/{id}/children", get(list_children))
        .route(
            "/api/pages/{id}/components",
            get(get_components).put(save_components),
        )
}

/// Body for `PATCH /api/pages/{id}`.
#[derive(Debug, Deserialize)]
struct UpdatePageRequest {
    revision: i64,
    #[serde(flatten)]
    changes: UpdatePage,
}

/// Body for `PUT /api/pages/{id}/components`.
#[derive(Debug, Deserialize)]
struct SaveComponentsRequest {
    revision: i64,
    components: Vec<ComponentInput>,
    #[serde(default)]
    note: Option<String>,
}

async fn create_page(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(input): Json<CreatePage>,
) -> AppResult<(StatusCode, Json<Page>)> {
    let page = state.pages().create(input, actor).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn list_pages(
    State(state): State<AppState>,
    Query(mut filter): Query<PageFilter>,
) -> AppResult<Json<Vec<Page>>> {
    filter.limit = Some(state.config().page_size(filter.limit));
    filter.offset = Some(filter.offset.unwrap_or(0).max(0));
    Ok(Json(state.pages().list(&filter).await?))
}

async fn get_page(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Page>> {
    Ok(Json(state.pages().get(id).await?))
}

async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<UpdatePageRequest>,
) -> AppResult<Json<Page>> {
    let page = state
        .pages()
        .update(id, request.revision, request.changes, actor)
        .await?;
    Ok(Json(page))
}

async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(_actor): Actor,
) -> AppResult<StatusCode> {
    state.pages().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Page>>> {
    Ok(Json(state.pages().children(id).await?))
}

async fn get_components(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<PageComponent>>> {
    Ok(Json(state.pages().components(id).await?))
}

async fn save_components(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<SaveComponentsRequest>,
) -> AppResult<Json<SavedPage>> {
    let saved = state
        .pages()
        .save_components(id, request.revision, request.components, actor, request.note)
        .await?;
    Ok(Json(saved))
}
