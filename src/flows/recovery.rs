// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password recovery flow.
//!
//! ```text
//! Checking ──> Valid ──(password updated)──> Completed
//!     └──────> Invalid
//! ```

use super::route::RecoveryParams;
use crate::backend::{AuthApi, OtpType, ServiceError};
use crate::forms::{FormError, NewPasswordForm};
use serde::Serialize;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const INVALID_LINK: &str = "Link de recuperação inválido ou expirado.";
pub const CHECK_FAILED: &str = "Erro ao verificar link de recuperação.";

/// Where the browser goes once the new password is saved.
pub const COMPLETED_REDIRECT: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecoveryState {
    Checking,
    /// The link opened a session; the new-password form may be submitted
    Valid,
    Invalid { message: String },
    Completed {
        redirect_to: String,
        redirect_after_ms: u64,
    },
}

/// One browser's recovery attempt.
#[derive(Debug)]
pub struct RecoveryFlow {
    state: RecoveryState,
}

impl Default for RecoveryFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryFlow {
    pub fn new() -> Self {
        Self {
            state: RecoveryState::Checking,
        }
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Establish the recovery session from the link parameters.
    pub async fn verify<A: AuthApi + ?Sized>(
        &mut self,
        auth: &A,
        params: &RecoveryParams,
    ) -> &RecoveryState {
        self.state = check_link(auth, params).await;
        &self.state
    }

    /// Validate and save the new password.
    ///
    /// Form errors are returned before any backend call. On success the
    /// flow is `Completed` and the caller schedules the sign-out.
    pub async fn submit<A: AuthApi + ?Sized>(
        &mut self,
        auth: &A,
        form: &NewPasswordForm,
        redirect_delay: Duration,
    ) -> Result<&RecoveryState, FormError> {
        match &self.state {
            RecoveryState::Valid => {}
            RecoveryState::Invalid { message } => return Err(FormError::new(message.clone())),
            RecoveryState::Checking | RecoveryState::Completed { .. } => {
                return Err(FormError::new(INVALID_LINK))
            }
        }

        form.check()?;

        auth.update_password(&form.password).await.map_err(|e| {
            tracing::warn!(error = %e, "Password update failed");
            FormError::new(format!("Erro ao atualizar password: {}", e))
        })?;

        tracing::info!("Password updated from recovery link");
        self.state = RecoveryState::Completed {
            redirect_to: COMPLETED_REDIRECT.to_string(),
            redirect_after_ms: redirect_delay.as_millis() as u64,
        };
        Ok(&self.state)
    }
}

/// Resolve a recovery link: token pair, then one-time token, then any
/// session the browser already has.
pub async fn check_link<A: AuthApi + ?Sized>(auth: &A, params: &RecoveryParams) -> RecoveryState {
    if let Some((access_token, refresh_token)) = params.token_pair() {
        return match auth.set_session(access_token, refresh_token).await {
            Ok(_) => RecoveryState::Valid,
            Err(e) => invalid_link(&e, "Failed to restore session from recovery link"),
        };
    }

    if let (true, Some(token)) = (params.is_recovery_type(), params.token.as_deref()) {
        return match auth.verify_otp(token, OtpType::Recovery).await {
            Ok(_) => RecoveryState::Valid,
            Err(e) => invalid_link(&e, "Failed to verify recovery token"),
        };
    }

    match auth.get_session().await {
        Ok(Some(_)) => RecoveryState::Valid,
        Ok(None) => RecoveryState::Invalid {
            message: INVALID_LINK.to_string(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session for recovery");
            RecoveryState::Invalid {
                message: CHECK_FAILED.to_string(),
            }
        }
    }
}

fn invalid_link(error: &ServiceError, what: &str) -> RecoveryState {
    tracing::info!(error = %error, "{}", what);
    RecoveryState::Invalid {
        message: INVALID_LINK.to_string(),
    }
}
