use shared::{
    domain::TodoId,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

/// Failure of a remote persistence call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Validation(String),
}

impl From<ApiError> for PersistenceError {
    fn from(value: ApiError) -> Self {
        match value.code {
            ErrorCode::NotFound => PersistenceError::NotFound(value.message),
            ErrorCode::Validation => PersistenceError::Validation(value.message),
            ErrorCode::Internal => PersistenceError::Transport(value.message),
        }
    }
}

impl From<reqwest::Error> for PersistenceError {
    fn from(value: reqwest::Error) -> Self {
        PersistenceError::Transport(value.to_string())
    }
}

/// Outcome reported to the caller of a coordinator operation. By the time a
/// caller sees one, the speculative change has already been undone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Remote(#[from] PersistenceError),
    #[error("delete already in flight for todo {0}")]
    DeleteInFlight(TodoId),
}
