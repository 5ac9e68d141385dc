// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entry views: what the browser should render for the URL it landed on.

use crate::flows::{self, callback, CallbackState, RecoveryState, Route};
use crate::session::{AuthState, BrowserSession};
use crate::AppState;
use axum::{http::Uri, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(entry))
        .route(flows::route::RESET_PASSWORD_PATH, get(entry))
        .route(flows::route::AUTH_CALLBACK_PATH, get(entry))
}

/// Top-level screen of the main app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Auth,
    Dashboard,
    Admin,
}

impl Screen {
    /// Signed-out users get the auth screen; `page=admin` only counts for admins.
    pub fn for_state(auth: &AuthState, page: Option<&str>) -> Self {
        match auth.user() {
            None => Screen::Auth,
            Some(user) if user.is_admin() && page == Some("admin") => Screen::Admin,
            Some(_) => Screen::Dashboard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AppView {
    ResetPassword {
        recovery: RecoveryState,
    },
    AuthCallback {
        callback: CallbackState,
    },
    Main {
        auth: AuthState,
        screen: Screen,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Classify the entry URL once and resolve the matching view.
async fn entry(
    Extension(session): Extension<Arc<BrowserSession>>,
    uri: Uri,
) -> Json<AppView> {
    let route = flows::classify(uri.path(), uri.query());
    tracing::debug!(path = uri.path(), route = route.name(), "Entry request classified");

    let view = match route {
        Route::ResetPassword(params) => {
            let mut flow = session.recovery().lock().await;
            *flow = flows::RecoveryFlow::new();
            let recovery = flow
                .verify(session.context().backend().as_ref(), &params)
                .await
                .clone();
            AppView::ResetPassword { recovery }
        }
        Route::AuthCallback(params) => AppView::AuthCallback {
            callback: callback::complete(session.context(), &params).await,
        },
        Route::Main { error, page } => {
            let auth = session.context().ready().await;
            let screen = Screen::for_state(&auth, page.as_deref());
            AppView::Main {
                auth,
                screen,
                error,
            }
        }
    };

    Json(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CurrentUser, Role, UserSource};

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: "u-1".to_string(),
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
            phone: None,
            role,
            created_at: String::new(),
            source: UserSource::Profile,
        }
    }

    #[test]
    fn test_screen_selection() {
        assert_eq!(Screen::for_state(&AuthState::SignedOut, Some("admin")), Screen::Auth);

        let learner = AuthState::SignedIn(user(Role::User));
        assert_eq!(Screen::for_state(&learner, None), Screen::Dashboard);
        assert_eq!(Screen::for_state(&learner, Some("admin")), Screen::Dashboard);

        let admin = AuthState::SignedIn(user(Role::Admin));
        assert_eq!(Screen::for_state(&admin, Some("admin")), Screen::Admin);
        assert_eq!(Screen::for_state(&admin, Some("dashboard")), Screen::Dashboard);
    }

    #[test]
    fn test_main_view_serialization() {
        let view = AppView::Main {
            auth: AuthState::SignedOut,
            screen: Screen::Auth,
            error: Some("auth_failed".to_string()),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view"], "main");
        assert_eq!(json["screen"], "auth");
        assert_eq!(json["auth"]["status"], "signed_out");
        assert_eq!(json["error"], "auth_failed");
    }
}
