// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password recovery links: verification, new-password submission and the
//! forced sign-out afterwards.

use axum::http::StatusCode;
use course_portal::backend::memory::CallCounts;
use course_portal::flows::recovery::INVALID_LINK;
use course_portal::forms::{PASSWORD_MISMATCH, PASSWORD_TOO_SHORT};
use course_portal::models::Role;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

mod common;

async fn open_link(app: &axum::Router, uri: &str) -> (String, serde_json::Value) {
    let response = app.clone().oneshot(common::get(uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = common::session_cookie(&response).expect("session cookie");
    (cookie, common::body_json(response).await)
}

fn new_password(cookie: &str, password: &str, confirmation: &str) -> axum::http::Request<axum::body::Body> {
    common::send_json(
        "POST",
        "/api/auth/new-password",
        Some(cookie),
        json!({ "password": password, "confirm_password": confirmation }),
    )
}

#[tokio::test]
async fn test_recovery_token_link_is_valid() {
    let (app, _, memory) = common::create_test_app();
    common::seed_user(&memory, "ana@example.com", "secret1", "Ana", Role::User);
    let token = memory.issue_recovery_token("ana@example.com").unwrap();

    let (_, body) = open_link(&app, &format!("/?type=recovery&token={}", token)).await;

    assert_eq!(body["view"], "reset_password");
    assert_eq!(body["recovery"]["state"], "valid");
}

#[tokio::test]
async fn test_recovery_token_pair_link_is_valid() {
    let (app, _, memory) = common::create_test_app();
    common::seed_user(&memory, "ana@example.com", "secret1", "Ana", Role::User);
    let (access, refresh) = memory.issue_session_tokens("ana@example.com").unwrap();

    let (_, body) = open_link(
        &app,
        &format!(
            "/reset-password?access_token={}&refresh_token={}&type=recovery",
            access, refresh
        ),
    )
    .await;

    assert_eq!(body["recovery"]["state"], "valid");
}

#[tokio::test]
async fn test_reset_page_without_session_is_invalid() {
    let (app, _, _) = common::create_test_app();

    let (_, body) = open_link(&app, "/reset-password").await;

    assert_eq!(body["view"], "reset_password");
    assert_eq!(body["recovery"]["state"], "invalid");
    assert_eq!(body["recovery"]["message"], INVALID_LINK);
}

#[tokio::test]
async fn test_used_token_is_invalid() {
    let (app, _, memory) = common::create_test_app();
    common::seed_user(&memory, "ana@example.com", "secret1", "Ana", Role::User);
    let token = memory.issue_recovery_token("ana@example.com").unwrap();
    let uri = format!("/reset-password?type=recovery&token={}", token);

    open_link(&app, &uri).await;
    let (_, body) = open_link(&app, &uri).await;

    assert_eq!(body["recovery"]["state"], "invalid");
}

#[tokio::test]
async fn test_short_password_rejected_without_backend_call() {
    let (app, _, memory) = common::create_test_app();
    common::seed_user(&memory, "ana@example.com", "secret1", "Ana", Role::User);
    let token = memory.issue_recovery_token("ana@example.com").unwrap();
    let (cookie, _) = open_link(&app, &format!("/?type=recovery&token={}", token)).await;

    let response = app
        .clone()
        .oneshot(new_password(&cookie, "abc", "abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = common::body_json(response).await;
    assert_eq!(body["details"], PASSWORD_TOO_SHORT);

    let response = app
        .oneshot(new_password(&cookie, "segredo1", "segredo2"))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["details"], PASSWORD_MISMATCH);

    assert_eq!(CallCounts::count(&memory.calls().update_password), 0);
}

#[tokio::test]
async fn test_new_password_without_valid_link() {
    let (app, _, memory) = common::create_test_app();
    let cookie = common::open_session(&app).await;

    let response = app
        .oneshot(new_password(&cookie, "segredo1", "segredo1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(CallCounts::count(&memory.calls().update_password), 0);
}

#[tokio::test]
async fn test_password_updated_then_signed_out() {
    let (app, state, memory) = common::create_test_app();
    common::seed_user(&memory, "ana@example.com", "secret1", "Ana", Role::User);
    let token = memory.issue_recovery_token("ana@example.com").unwrap();
    let (cookie, _) = open_link(&app, &format!("/reset-password?type=recovery&token={}", token)).await;

    let response = app
        .clone()
        .oneshot(new_password(&cookie, "novasenha1", "novasenha1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["state"], "completed");
    assert_eq!(body["redirect_to"], "/");
    assert_eq!(
        body["redirect_after_ms"],
        state.config.reset_redirect_delay.as_millis() as u64
    );
    assert_eq!(CallCounts::count(&memory.calls().update_password), 1);

    // The forced sign-out runs after the redirect delay
    tokio::time::sleep(state.config.reset_redirect_delay + Duration::from_millis(300)).await;
    let response = app
        .clone()
        .oneshot(common::get("/api/auth/me", Some(&cookie)))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["status"], "signed_out");

    // The new password works
    common::signed_in_session(&app, "ana@example.com", "novasenha1").await;
}
