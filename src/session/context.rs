// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-browser auth context: the backend client, the Current User store
//! and the listener that keeps them in sync.

use super::bootstrap::bootstrap;
use super::hydrator::{hydrate, hydrate_with, insert_profile};
use super::listener::AuthListener;
use super::signout::{self, Navigation};
use super::store::{AuthState, SessionStore};
use crate::backend::{Backend, OAuthProvider, ServiceError, SignUpRequest};
use crate::crypto;
use crate::forms::{FormError, LoginForm, RegistrationForm};
use crate::models::{CurrentUser, NewProfile, Role};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub const INVALID_CREDENTIALS: &str = "Invalid login credentials";
pub const INVALID_CREDENTIALS_MESSAGE: &str =
    "Email ou password incorretos. Verifique os seus dados ou crie uma conta.";
pub const RESET_EMAIL_FAILED: &str = "Erro ao enviar email de recuperação";

/// Settings shared by every context.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// Public site origin for auth redirect links
    pub site_url: String,
    pub bootstrap_timeout: Duration,
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SignUpOutcome {
    /// The backend created a session right away
    SignedIn(CurrentUser),
    /// The account exists but the email must be confirmed first
    ConfirmationPending,
}

pub struct AuthContext {
    backend: Arc<dyn Backend>,
    store: Arc<SessionStore>,
    settings: ContextSettings,
    /// Verifier for the OAuth sign-in in progress
    pkce_verifier: Mutex<Option<String>>,
    _listener: AuthListener,
}

impl AuthContext {
    /// Subscribe to auth events and start resolving the stored session.
    ///
    /// Returns immediately; the store stays `Loading` until bootstrap
    /// resolves or times out. Use [`AuthContext::ready`] to wait.
    pub fn start(backend: Arc<dyn Backend>, settings: ContextSettings) -> Self {
        let store = Arc::new(SessionStore::new());
        let events = backend.subscribe();
        let listener = AuthListener::spawn(backend.clone(), store.clone(), events);

        tokio::spawn(bootstrap(
            backend.clone(),
            store.clone(),
            settings.bootstrap_timeout,
        ));

        Self {
            backend,
            store,
            settings,
            pkce_verifier: Mutex::new(None),
            _listener: listener,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn current(&self) -> AuthState {
        self.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.store.subscribe()
    }

    /// Wait for bootstrap to resolve (bounded by the bootstrap timeout).
    pub async fn ready(&self) -> AuthState {
        self.store.ready().await
    }

    /// Current user once bootstrap has resolved.
    pub async fn user(&self) -> Option<CurrentUser> {
        self.ready().await.user().cloned()
    }

    pub async fn sign_in(&self, form: &LoginForm) -> Result<CurrentUser, FormError> {
        form.check()?;

        let session = self
            .backend
            .sign_in_with_password(form.email.trim(), &form.password)
            .await
            .map_err(|e| match e {
                ServiceError::Auth(msg) if msg.contains(INVALID_CREDENTIALS) => {
                    FormError::new(INVALID_CREDENTIALS_MESSAGE)
                }
                other => FormError::new(other.to_string()),
            })?;

        // Ticket taken after the backend call so this write is newer than
        // the listener's handling of the sign-in event it triggered.
        let ticket = self.store.ticket();
        let user = hydrate(self.backend.as_ref(), &session.user).await;
        self.store.commit(ticket, Some(user.clone()));
        tracing::info!(user_id = %user.id, "Signed in with password");
        Ok(user)
    }

    pub async fn sign_up(&self, form: &RegistrationForm) -> Result<SignUpOutcome, FormError> {
        let valid = form.check()?;

        let request = SignUpRequest {
            email: valid.email.clone(),
            password: valid.password.clone(),
            name: valid.name.clone(),
        };
        let identity = self
            .backend
            .sign_up(&request)
            .await
            .map_err(|e| FormError::new(e.to_string()))?;

        let Some(identity) = identity else {
            return Ok(SignUpOutcome::ConfirmationPending);
        };
        tracing::info!(user_id = %identity.id, "Account registered");

        let profile = NewProfile {
            id: identity.id.clone(),
            email: valid.email,
            name: valid.name,
            phone: valid.phone,
            role: Role::User,
        };

        match self.backend.get_session().await {
            Ok(Some(session)) if session.user.id == identity.id => {
                // The listener may already be provisioning this id from the
                // sign-in event; overwrite so the phone is kept either way.
                if let Err(e) = self.backend.save_profile(&profile).await {
                    tracing::warn!(user_id = %identity.id, error = %e, "Failed to save profile at sign-up");
                }
                // Any newer listener write reads the saved row.
                let ticket = self.store.ticket();
                let user = hydrate_with(self.backend.as_ref(), &session.user, profile).await;
                self.store.commit(ticket, Some(user.clone()));
                Ok(SignUpOutcome::SignedIn(user))
            }
            _ => {
                if let Err(e) = insert_profile(self.backend.as_ref(), &profile).await {
                    tracing::warn!(user_id = %identity.id, error = %e, "Failed to create profile at sign-up");
                }
                Ok(SignUpOutcome::ConfirmationPending)
            }
        }
    }

    /// Start a Google sign-in; returns the provider URL to send the browser to.
    pub fn sign_in_with_google(&self) -> anyhow::Result<String> {
        let verifier = crypto::random_token(crypto::TOKEN_BYTES)?;
        let challenge = crypto::code_challenge(&verifier);
        let redirect_to = format!("{}/auth/callback", self.settings.site_url);

        if let Ok(mut slot) = self.pkce_verifier.lock() {
            *slot = Some(verifier);
        }
        Ok(self
            .backend
            .oauth_authorize_url(OAuthProvider::Google, &redirect_to, &challenge))
    }

    /// Verifier stored by the last [`AuthContext::sign_in_with_google`].
    pub fn take_pkce_verifier(&self) -> Option<String> {
        self.pkce_verifier.lock().ok().and_then(|mut slot| slot.take())
    }

    pub async fn sign_out(&self) -> Navigation {
        signout::sign_out(self.backend.as_ref(), &self.store).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), FormError> {
        let redirect_to = format!("{}/reset-password", self.settings.site_url);
        self.backend
            .reset_password_for_email(email.trim(), &redirect_to)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to send recovery email");
                FormError::new(RESET_EMAIL_FAILED)
            })
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.store.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{CallCounts, Faults};
    use crate::backend::MemoryStore;
    use crate::models::UserSource;

    fn settings() -> ContextSettings {
        ContextSettings {
            site_url: "http://localhost:5173".to_string(),
            bootstrap_timeout: Duration::from_secs(1),
        }
    }

    fn start(memory: &MemoryStore) -> AuthContext {
        AuthContext::start(Arc::new(memory.client()), settings())
    }

    fn login(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fresh_context_resolves_signed_out() {
        let memory = MemoryStore::new();
        let ctx = start(&memory);
        assert_eq!(ctx.ready().await, AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_in_resolves_user() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let ctx = start(&memory);
        ctx.ready().await;

        let user = ctx.sign_in(&login("ana@example.com", "secret1")).await.unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(ctx.user().await.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_wrong_password_is_translated() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let ctx = start(&memory);

        let err = ctx.sign_in(&login("ana@example.com", "wrong1")).await.unwrap_err();
        assert_eq!(err.0, INVALID_CREDENTIALS_MESSAGE);
    }

    #[tokio::test]
    async fn test_sign_up_stores_phone_on_profile() {
        let memory = MemoryStore::new();
        let ctx = start(&memory);
        let form = RegistrationForm {
            name: "Rui".to_string(),
            email: "rui@example.com".to_string(),
            phone: "912345678".to_string(),
            country_code: "+351".to_string(),
            password: "segredo1".to_string(),
            confirm_password: "segredo1".to_string(),
            accept_terms: true,
        };

        let outcome = ctx.sign_up(&form).await.unwrap();
        assert_eq!(outcome, SignUpOutcome::ConfirmationPending);

        let user = ctx.sign_in(&login("rui@example.com", "segredo1")).await.unwrap();
        assert_eq!(user.phone.as_deref(), Some("+351912345678"));
        assert_eq!(user.source, UserSource::Profile);
        assert_eq!(memory.profile_count(), 1);
    }

    #[tokio::test]
    async fn test_auto_confirmed_sign_up_keeps_phone() {
        let memory = MemoryStore::new();
        memory.set_auto_confirm(true);
        // Slow lookups keep the listener's provisioning in flight.
        memory
            .faults()
            .profile_lookup_delay_ms
            .store(20, std::sync::atomic::Ordering::SeqCst);
        let ctx = start(&memory);
        ctx.ready().await;
        let form = RegistrationForm {
            name: "Rui".to_string(),
            email: "rui@example.com".to_string(),
            phone: "912345678".to_string(),
            country_code: "+351".to_string(),
            password: "segredo1".to_string(),
            confirm_password: "segredo1".to_string(),
            accept_terms: true,
        };

        let user = match ctx.sign_up(&form).await.unwrap() {
            SignUpOutcome::SignedIn(user) => user,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(user.phone.as_deref(), Some("+351912345678"));
        assert_eq!(
            memory.profile(&user.id).and_then(|p| p.phone).as_deref(),
            Some("+351912345678")
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            ctx.current().user().and_then(|u| u.phone.clone()).as_deref(),
            Some("+351912345678")
        );
        assert_eq!(memory.profile_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_registration_makes_no_backend_call() {
        let memory = MemoryStore::new();
        let ctx = start(&memory);
        let form = RegistrationForm {
            name: "Rui".to_string(),
            email: "rui@example.com".to_string(),
            phone: String::new(),
            country_code: "+351".to_string(),
            password: "abc".to_string(),
            confirm_password: "abc".to_string(),
            accept_terms: true,
        };

        assert!(ctx.sign_up(&form).await.is_err());
        assert_eq!(CallCounts::count(&memory.calls().sign_up), 0);
    }

    #[tokio::test]
    async fn test_google_sign_in_stores_verifier() {
        let memory = MemoryStore::new();
        let ctx = start(&memory);

        let url = ctx.sign_in_with_google().unwrap();
        assert!(url.contains("provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A5173%2Fauth%2Fcallback"));

        let verifier = ctx.take_pkce_verifier().expect("verifier stored");
        assert!(url.contains(&crypto::code_challenge(&verifier)));
        assert_eq!(ctx.take_pkce_verifier(), None);
    }

    #[tokio::test]
    async fn test_reset_password_failure_message() {
        let memory = MemoryStore::new();
        Faults::enable(&memory.faults().fail_reset_email);
        let ctx = start(&memory);

        let err = ctx.reset_password("ana@example.com").await.unwrap_err();
        assert_eq!(err.0, RESET_EMAIL_FAILED);
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_remote_fails() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        Faults::enable(&memory.faults().fail_sign_out);
        let ctx = start(&memory);
        ctx.sign_in(&login("ana@example.com", "secret1")).await.unwrap();

        let nav = ctx.sign_out().await;
        assert_eq!(nav.location, "/");
        assert_eq!(ctx.current(), AuthState::SignedOut);
    }
}
