//! Shared route helpers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the id of the acting user, set by the auth proxy.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user performing a mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| AppError::BadRequest("missing X-Actor-Id header".to_string()))?;
        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Actor)
            .ok_or_else(|| AppError::BadRequest("X-Actor-Id must be a UUID".to_string()))
    }
}

/// `?limit=&offset=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Paging {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Paging {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Body for operations that need the caller's revision token.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RevisionBody {
    pub revision: i64,
}
