// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{services::generation::GenerationError, store::StoreError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    // 500 Internal Server Error
    #[error("internal server error: {0}")]
    InternalServerError(String),

    // 400 Bad Request
    #[error("bad request: {0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("unauthorized: {0}")]
    AuthError(String),

    // 403 Forbidden (resource belongs to another user)
    #[error("forbidden: {0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("not found: {0}")]
    NotFound(String),

    // 409 Conflict (e.g., attempt already submitted)
    #[error("conflict: {0}")]
    Conflict(String),

    // 422 Paper or test has no linked questions
    #[error("no questions available for this test")]
    EmptyQuestionSet,

    /// Missing provider key. Fatal until an admin configures it.
    #[error("configuration error: {0}")]
    Config(String),

    /// Model output could not be turned into content.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("upstream rate limit exceeded")]
    UpstreamRateLimited,

    #[error("upstream payment required")]
    UpstreamPaymentRequired,

    /// Submission could not be persisted. The session is kept for a retry.
    #[error("submit failed: {0}")]
    SubmitFailed(String),
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::EmptyQuestionSet => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "No questions available for this test".to_string(),
            ),
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::GenerationFailed(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::UpstreamRateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            AppError::UpstreamPaymentRequired => (
                StatusCode::PAYMENT_REQUIRED,
                "Payment required. Please add credits to continue.".to_string(),
            ),
            AppError::SubmitFailed(msg) => {
                tracing::error!("Submit failed: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Failed to submit test. Your answers are kept, please retry.".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `StoreError` into `AppError`.
/// Allows using `?` operator on store calls.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyCompleted => {
                AppError::Conflict("Attempt has already been submitted".to_string())
            }
            StoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::MissingKey(key) => AppError::Config(format!(
                "{key} not configured. Please add it in the admin panel."
            )),
            GenerationError::RateLimited => AppError::UpstreamRateLimited,
            GenerationError::PaymentRequired => AppError::UpstreamPaymentRequired,
            GenerationError::Store(e) => AppError::from(e),
            other => {
                tracing::error!("Generation failed: {}", other);
                AppError::GenerationFailed(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
