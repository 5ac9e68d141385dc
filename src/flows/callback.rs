// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth provider callback: finish the sign-in, make sure a profile exists,
//! then send the browser home.

use super::route::CallbackParams;
use crate::backend::ServiceError;
use crate::models::CurrentUser;
use crate::session::hydrator::hydrate;
use crate::session::AuthContext;
use serde::Serialize;

pub const HOME: &str = "/";
pub const AUTH_FAILED_REDIRECT: &str = "/?error=auth_failed";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallbackState {
    Checking,
    Success {
        user: CurrentUser,
        redirect_to: String,
    },
    Redirect {
        redirect_to: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl CallbackState {
    fn failed() -> Self {
        CallbackState::Redirect {
            redirect_to: AUTH_FAILED_REDIRECT.to_string(),
            error: Some("auth_failed".to_string()),
        }
    }

    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            CallbackState::Checking => None,
            CallbackState::Success { redirect_to, .. }
            | CallbackState::Redirect { redirect_to, .. } => Some(redirect_to),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CallbackError {
    #[error("provider returned {error}: {description}")]
    Provider { error: String, description: String },

    #[error("no PKCE verifier for this browser")]
    MissingVerifier,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Run the callback for one browser and commit the result to its store.
pub async fn complete(ctx: &AuthContext, params: &CallbackParams) -> CallbackState {
    match resolve_session(ctx, params).await {
        Ok(Some(session)) => {
            let ticket = ctx.store().ticket();
            let user = hydrate(ctx.backend().as_ref(), &session.user).await;
            ctx.store().commit(ticket, Some(user.clone()));
            tracing::info!(user_id = %user.id, "OAuth sign-in completed");
            CallbackState::Success {
                user,
                redirect_to: HOME.to_string(),
            }
        }
        Ok(None) => {
            tracing::info!("OAuth callback without a session");
            CallbackState::Redirect {
                redirect_to: HOME.to_string(),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth callback failed");
            CallbackState::failed()
        }
    }
}

async fn resolve_session(
    ctx: &AuthContext,
    params: &CallbackParams,
) -> Result<Option<crate::models::Session>, CallbackError> {
    if let Some(error) = &params.error {
        return Err(CallbackError::Provider {
            error: error.clone(),
            description: params.error_description.clone().unwrap_or_default(),
        });
    }

    let backend = ctx.backend();
    match &params.code {
        Some(code) => {
            let verifier = ctx
                .take_pkce_verifier()
                .ok_or(CallbackError::MissingVerifier)?;
            Ok(Some(backend.exchange_code_for_session(code, &verifier).await?))
        }
        None => Ok(backend.get_session().await?),
    }
}
