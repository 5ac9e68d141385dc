// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use course_portal::backend::MemoryStore;
use course_portal::config::Config;
use course_portal::middleware::session::SESSION_COOKIE;
use course_portal::models::{Profile, Role};
use course_portal::routes::create_router;
use course_portal::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Config for router tests: short timeouts, no real backend.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        bootstrap_timeout: Duration::from_millis(500),
        reset_redirect_delay: Duration::from_millis(50),
        ..Config::test_default()
    }
}

/// Create a test app over an in-memory backend.
/// Returns the router, the shared state and the backend tables.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryStore) {
    create_test_app_with_config(test_config())
}

#[allow(dead_code)]
pub fn create_test_app_with_site_url(site_url: &str) -> (axum::Router, Arc<AppState>, MemoryStore) {
    create_test_app_with_config(Config {
        site_url: site_url.to_string(),
        ..test_config()
    })
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>, MemoryStore) {
    let memory = MemoryStore::new();
    let state = Arc::new(AppState::new(config, Arc::new(memory.clone())));
    (create_router(state.clone()), state, memory)
}

/// Seed an account with a stored profile of the given role.
#[allow(dead_code)]
pub fn seed_user(memory: &MemoryStore, email: &str, password: &str, name: &str, role: Role) {
    let identity = memory.add_account(email, password, name);
    memory.put_profile(Profile {
        id: identity.id,
        email: email.to_string(),
        name: name.to_string(),
        phone: None,
        role,
        created_at: "2025-01-01T00:00:00Z".to_string(),
    });
}

#[allow(dead_code)]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn send_json(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` pair of the session cookie set on a response, if any.
#[allow(dead_code)]
pub fn session_cookie(response: &Response) -> Option<String> {
    set_cookie_headers(response)
        .into_iter()
        .find(|value| value.starts_with(&format!("{SESSION_COOKIE}=")))
        .and_then(|value| value.split(';').next().map(str::to_string))
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Open a browser session and return its cookie.
#[allow(dead_code)]
pub async fn open_session(app: &axum::Router) -> String {
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(get("/api/auth/me", None))
        .await
        .unwrap();
    session_cookie(&response).expect("session cookie set on first request")
}

/// Open a browser session and sign it in.
#[allow(dead_code)]
pub async fn signed_in_session(app: &axum::Router, email: &str, password: &str) -> String {
    use tower::ServiceExt;

    let cookie = open_session(app).await;
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/auth/sign-in",
            Some(&cookie),
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    cookie
}
