//! Publishing engine errors.

use thiserror::Error;

use crate::models::PageStatus;
use crate::store::SlugTaken;

/// Errors raised by the content services.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The page, version or workflow does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The lifecycle has no edge between the two states, or a guard failed.
    #[error("cannot move page from {from} to {to}: {reason}")]
    InvalidTransition {
        from: PageStatus,
        to: PageStatus,
        reason: String,
    },

    /// Publishing is blocked by the approval gate.
    #[error("approval required: {0}")]
    ApprovalRequired(String),

    /// The request is well-formed but not allowed in the current state.
    #[error("{0}")]
    InvalidOperation(String),

    /// A uniqueness rule or optimistic-concurrency check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence failure; the transaction has been rolled back.
    #[error("storage error")]
    Storage(#[source] anyhow::Error),
}

impl From<anyhow::Error> for ContentError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<SlugTaken>() {
            Ok(taken) => Self::Conflict(taken.to_string()),
            Err(err) => Self::Storage(err),
        }
    }
}

impl ContentError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Whether the error is the approval gate refusing a publish.
    pub fn is_approval_required(&self) -> bool {
        matches!(self, Self::ApprovalRequired(_))
    }
}

/// Result type for content operations.
pub type ContentResult<T> = Result<T, ContentError>;
