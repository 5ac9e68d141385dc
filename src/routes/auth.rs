// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, registration, Google OAuth, sign-out and password recovery routes.

use axum::{
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::flows::RecoveryState;
use crate::forms::{password_strength, LoginForm, NewPasswordForm, PasswordStrength, RegistrationForm};
use crate::middleware::session::removal_cookie;
use crate::models::CurrentUser;
use crate::session::{AuthState, BrowserSession, Navigation, SignUpOutcome};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/google", get(google_start))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/new-password", post(new_password))
        .route("/api/auth/password-strength", post(strength))
}

/// Auth state once bootstrap has resolved.
async fn me(Extension(session): Extension<Arc<BrowserSession>>) -> Json<AuthState> {
    Json(session.context().ready().await)
}

async fn sign_in(
    Extension(session): Extension<Arc<BrowserSession>>,
    Json(form): Json<LoginForm>,
) -> Result<Json<CurrentUser>> {
    let user = session.context().sign_in(&form).await?;
    Ok(Json(user))
}

async fn sign_up(
    Extension(session): Extension<Arc<BrowserSession>>,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<SignUpOutcome>> {
    let outcome = session.context().sign_up(&form).await?;
    Ok(Json(outcome))
}

/// Start Google sign-in - redirect to the provider.
async fn google_start(Extension(session): Extension<Arc<BrowserSession>>) -> Result<Redirect> {
    let url = session.context().sign_in_with_google()?;
    tracing::info!("Redirecting to Google sign-in");
    Ok(Redirect::temporary(&url))
}

/// Sign out, forget this browser session and expire its cookie.
async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
    jar: CookieJar,
) -> (CookieJar, Json<Navigation>) {
    let navigation = session.context().sign_out().await;
    state.sessions.remove(session.id());
    tracing::info!("Browser session signed out");
    (jar.remove(removal_cookie(&state)), Json(navigation))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Send the recovery email.
async fn reset_password(
    Extension(session): Extension<Arc<BrowserSession>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<StatusCode> {
    session.context().reset_password(&body.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Save the new password for the recovery link verified on this browser.
///
/// On success the browser is signed out after the configured delay.
async fn new_password(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
    Json(form): Json<NewPasswordForm>,
) -> Result<Json<RecoveryState>> {
    let recovery = {
        let mut flow = session.recovery().lock().await;
        flow.submit(
            session.context().backend().as_ref(),
            &form,
            state.config.reset_redirect_delay,
        )
        .await?
        .clone()
    };

    let delay = state.config.reset_redirect_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        session.context().sign_out().await;
        tracing::debug!("Signed out after password reset");
    });

    Ok(Json(recovery))
}

#[derive(Deserialize)]
pub struct StrengthRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct StrengthResponse {
    pub strength: Option<PasswordStrength>,
}

/// Strength hint for the registration form.
async fn strength(Json(body): Json<StrengthRequest>) -> Json<StrengthResponse> {
    Json(StrengthResponse {
        strength: password_strength(&body.password),
    })
}
