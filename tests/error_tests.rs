// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use course_portal::backend::ServiceError;
use course_portal::error::AppError;
use course_portal::forms::FormError;

mod common;

#[test]
fn test_backend_errors_map_to_status() {
    let cases = [
        (ServiceError::Auth("Invalid JWT".to_string()), StatusCode::UNAUTHORIZED),
        (ServiceError::NotFound, StatusCode::NOT_FOUND),
        (ServiceError::Conflict("duplicate key".to_string()), StatusCode::CONFLICT),
        (ServiceError::Transient("timeout".to_string()), StatusCode::SERVICE_UNAVAILABLE),
        (ServiceError::Decode("bad json".to_string()), StatusCode::BAD_GATEWAY),
    ];

    for (err, status) in cases {
        let response = AppError::from(err.clone()).into_response();
        assert_eq!(response.status(), status, "{:?}", err);
    }
}

#[test]
fn test_gating_errors() {
    assert_eq!(
        AppError::Unauthorized.into_response().status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        AppError::Forbidden.into_response().status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_form_error_body_carries_message() {
    let response = AppError::from(FormError::new("As passwords não coincidem")).into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_form");
    assert_eq!(body["details"], "As passwords não coincidem");
}

#[tokio::test]
async fn test_internal_error_hides_details() {
    let response = AppError::Internal(anyhow::anyhow!("secret stack detail")).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = common::body_json(response).await;
    assert!(!body.to_string().contains("secret stack detail"));
}
