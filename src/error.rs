// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::engine::RuleError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses. The split
/// between validation kinds (4xx) and storage failures (500) is preserved
/// end-to-end so callers can tell "your input was invalid" from "the system
/// failed to persist".
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error: a storage/infrastructure failure. The
    // surrounding transaction has already rolled back; no retry is attempted.
    StorageError(String),

    // 400 Bad Request: basic shape/range violations.
    BadRequest(String),

    // 422 Unprocessable Entity: a type-specific answer rule was violated.
    RuleViolation(RuleError),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::RuleViolation(rule) => {
                (StatusCode::UNPROCESSABLE_ENTITY, rule.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::StorageError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<RuleError> for AppError {
    fn from(err: RuleError) -> Self {
        AppError::RuleViolation(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
