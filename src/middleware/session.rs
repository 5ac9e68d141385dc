// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser session cookie and role gating.
//!
//! Every browser carries a signed `course_session` cookie naming its entry
//! in the session registry. Unknown, forged or expired cookies simply get
//! a fresh session.

use crate::crypto;
use crate::error::{AppError, Result};
use crate::session::BrowserSession;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "course_session";

/// Build the session cookie for a browser session id.
pub fn session_cookie(state: &AppState, session_id: &str) -> anyhow::Result<Cookie<'static>> {
    let value = crypto::sign_value(session_id, &state.config.session_signing_key)?;
    Ok(Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.site_url.starts_with("https://"))
        .build())
}

/// Cookie that clears the session cookie; attributes match creation.
pub fn removal_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.site_url.starts_with("https://"))
        .build()
}

fn existing_session(state: &AppState, jar: &CookieJar) -> Option<Arc<BrowserSession>> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let id = crypto::verify_signed_value(cookie.value(), &state.config.session_signing_key)?;
    state.sessions.get(&id)
}

/// Attach the caller's browser session, opening one when needed.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(session) = existing_session(&state, &jar) {
        request.extensions_mut().insert(session);
        return Ok(next.run(request).await);
    }

    let session = state.sessions.create()?;
    tracing::debug!("Opened browser session");
    let cookie = session_cookie(&state, session.id())?;
    request.extensions_mut().insert(session);

    let response = next.run(request).await;
    Ok((jar.add(cookie), response).into_response())
}

fn browser_session(request: &Request) -> Result<Arc<BrowserSession>> {
    request
        .extensions()
        .get::<Arc<BrowserSession>>()
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("browser session not attached")))
}

/// Require a signed-in user; waits for bootstrap to resolve first.
pub async fn require_user(mut request: Request, next: Next) -> Result<Response> {
    let session = browser_session(&request)?;
    let user = session
        .context()
        .user()
        .await
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Require a signed-in admin.
pub async fn require_admin(mut request: Request, next: Next) -> Result<Response> {
    let session = browser_session(&request)?;
    let user = session
        .context()
        .user()
        .await
        .ok_or(AppError::Unauthorized)?;

    if !user.is_admin() {
        tracing::warn!(user_id = %user.id, "Non-admin denied admin route");
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
