//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::content::ContentError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Content(e) => match e {
                ContentError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                ContentError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "invalid_transition")
                }
                ContentError::ApprovalRequired(_) => (StatusCode::CONFLICT, "approval_required"),
                ContentError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                ContentError::InvalidOperation(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_operation")
                }
                ContentError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_kind();

        // Storage details stay in the log.
        let message = match &self {
            AppError::Internal(e) | AppError::Content(ContentError::Storage(e)) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::PageStatus;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn content_errors_map_to_status_codes() {
        assert_eq!(status(ContentError::not_found("page")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ContentError::InvalidTransition {
                from: PageStatus::Archived,
                to: PageStatus::Published,
                reason: "no such transition".to_string(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ContentError::ApprovalRequired("pending".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(status(ContentError::conflict("slug")), StatusCode::CONFLICT);
        assert_eq!(status(ContentError::invalid("reason")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ContentError::Storage(anyhow::anyhow!("connection reset"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
