// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::backend::ServiceError;
use crate::forms::FormError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Administrator role required")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Form validation or credential message shown inline to the user.
    #[error("{0}")]
    Form(#[from] FormError),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Backend error: {0}")]
    Backend(#[from] ServiceError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Form(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_form",
                Some(err.to_string()),
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                Some(msg.clone()),
            ),
            AppError::Backend(err) => match err {
                ServiceError::Auth(msg) => {
                    (StatusCode::UNAUTHORIZED, "auth_error", Some(msg.clone()))
                }
                ServiceError::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
                ServiceError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "conflict", Some(msg.clone()))
                }
                ServiceError::Transient(msg) => {
                    tracing::error!(error = %msg, "Backend unavailable");
                    (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", None)
                }
                ServiceError::Decode(msg) => {
                    tracing::error!(error = %msg, "Unexpected backend response");
                    (StatusCode::BAD_GATEWAY, "backend_error", None)
                }
            },
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
