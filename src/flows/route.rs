// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entry request classification.
//!
//! Decides once per entry request whether the browser is on a password
//! recovery link, returning from an OAuth provider, or loading the app.
//! Recovery takes precedence over the callback, which takes precedence
//! over the normal app.

use std::collections::HashMap;

pub const RESET_PASSWORD_PATH: &str = "/reset-password";
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Parameters a recovery link may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryParams {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// The `type` parameter
    pub kind: Option<String>,
    pub token: Option<String>,
}

impl RecoveryParams {
    pub fn is_recovery_type(&self) -> bool {
        self.kind.as_deref() == Some("recovery")
    }

    /// Access and refresh token pair, when both are present.
    pub fn token_pair(&self) -> Option<(&str, &str)> {
        Some((self.access_token.as_deref()?, self.refresh_token.as_deref()?))
    }
}

/// Parameters an OAuth provider appends to the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ResetPassword(RecoveryParams),
    AuthCallback(CallbackParams),
    Main {
        error: Option<String>,
        page: Option<String>,
    },
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::ResetPassword(_) => "reset_password",
            Route::AuthCallback(_) => "auth_callback",
            Route::Main { .. } => "main",
        }
    }
}

/// Decode a query string into its last value per key.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode_component(key)?, decode_component(value)?))
        })
        .collect()
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}

/// Classify an entry request by path and query string.
pub fn classify(path: &str, query: Option<&str>) -> Route {
    let mut params = query.map(parse_query).unwrap_or_default();
    let mut take = |key: &str| params.remove(key).filter(|v| !v.is_empty());

    let recovery = RecoveryParams {
        access_token: take("access_token"),
        refresh_token: take("refresh_token"),
        kind: take("type"),
        token: take("token"),
    };
    let callback = CallbackParams {
        code: take("code"),
        error: take("error"),
        error_description: take("error_description"),
    };
    let page = take("page");

    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    let is_recovery = path == RESET_PASSWORD_PATH
        || recovery.is_recovery_type()
        || recovery.token.is_some()
        || (recovery.token_pair().is_some() && recovery.is_recovery_type());

    if is_recovery {
        return Route::ResetPassword(recovery);
    }
    if path == AUTH_CALLBACK_PATH {
        return Route::AuthCallback(callback);
    }
    Route::Main {
        error: callback.error,
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_root_is_main() {
        assert_eq!(
            classify("/", None),
            Route::Main {
                error: None,
                page: None
            }
        );
    }

    #[test]
    fn test_main_carries_error_and_page() {
        assert_eq!(
            classify("/", Some("error=auth_failed&page=admin")),
            Route::Main {
                error: Some("auth_failed".to_string()),
                page: Some("admin".to_string())
            }
        );
    }

    #[test]
    fn test_reset_password_path() {
        assert!(matches!(
            classify("/reset-password", None),
            Route::ResetPassword(_)
        ));
        assert!(matches!(
            classify("/reset-password/", None),
            Route::ResetPassword(_)
        ));
    }

    #[test]
    fn test_recovery_type_on_any_path() {
        match classify("/", Some("type=recovery&token=abc")) {
            Route::ResetPassword(params) => {
                assert!(params.is_recovery_type());
                assert_eq!(params.token.as_deref(), Some("abc"));
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_bare_token_is_recovery() {
        assert!(matches!(
            classify("/", Some("token=abc")),
            Route::ResetPassword(_)
        ));
    }

    #[test]
    fn test_token_pair_without_recovery_type_is_not_recovery() {
        assert!(matches!(
            classify("/", Some("access_token=a&refresh_token=r")),
            Route::Main { .. }
        ));
    }

    #[test]
    fn test_recovery_beats_callback() {
        assert!(matches!(
            classify("/auth/callback", Some("type=recovery")),
            Route::ResetPassword(_)
        ));
    }

    #[test]
    fn test_callback_params() {
        assert_eq!(
            classify(
                "/auth/callback",
                Some("error=access_denied&error_description=User+denied%20access")
            ),
            Route::AuthCallback(CallbackParams {
                code: None,
                error: Some("access_denied".to_string()),
                error_description: Some("User denied access".to_string()),
            })
        );
        assert_eq!(
            classify("/auth/callback", Some("code=xyz")),
            Route::AuthCallback(CallbackParams {
                code: Some("xyz".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_empty_values_ignored() {
        assert!(matches!(
            classify("/", Some("token=&type=")),
            Route::Main { .. }
        ));
    }
}
