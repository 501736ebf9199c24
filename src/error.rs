use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::SessionError,
};

/// Failure of a session or storage operation, before it is mapped to HTTP.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The session store failed or holds an unreadable snapshot.
    #[error("session store failed")]
    Unavailable(#[source] StorageError),
    /// Missing or wrong admin token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Malformed quiz, answer or player name.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Action not allowed while the session is in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Unknown session or player.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(message) => ServiceError::InvalidInput(message),
            SessionError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
            SessionError::IllegalState { .. } => ServiceError::InvalidState(err.to_string()),
            SessionError::NotFound(message) => ServiceError::NotFound(message),
        }
    }
}

/// Errors returned by HTTP handlers, each carrying the message sent back to the client.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400.
    #[error("{0}")]
    BadRequest(String),
    /// 401.
    #[error("{0}")]
    Unauthorized(String),
    /// 404.
    #[error("{0}")]
    NotFound(String),
    /// The session is not in a state that allows the request.
    #[error("{0}")]
    Conflict(String),
    /// The session store cannot be reached.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// 500, e.g. a corrupted snapshot.
    #[error("{0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source @ StorageError::Unavailable { .. }) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Unavailable(source @ StorageError::Corrupted { .. }) => {
                AppError::Internal(source.to_string())
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
