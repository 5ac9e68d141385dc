// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted backend layer (auth, tables, blob storage).
//!
//! Every persistent operation goes through one of three ports:
//! - [`AuthApi`]: sessions, credentials, OAuth, password recovery
//! - [`DataApi`]: `profiles`, `chapters` and `user_progress` tables
//! - [`StorageApi`]: video and thumbnail objects
//!
//! One client instance exists per browser session; it holds that browser's
//! auth session and publishes [`AuthEvent`]s for it.

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::{SupabaseClient, SupabaseFactory};

use crate::models::{Chapter, ChapterDraft, Identity, NewProfile, Profile, Progress, Session};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const CHAPTERS: &str = "chapters";
    pub const USER_PROGRESS: &str = "user_progress";
}

/// Storage bucket names.
pub mod buckets {
    pub const VIDEOS: &str = "videos";
    pub const THUMBNAILS: &str = "thumbnails";
}

/// Capacity of each client's auth event channel.
pub const AUTH_EVENT_CAPACITY: usize = 16;

/// Backend error categories.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// Credentials or authorization rejected; carries the provider message.
    #[error("{0}")]
    Auth(String),

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network failure, rate limiting or a 5xx from the backend.
    #[error("Service unavailable: {0}")]
    Transient(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Auth state change published by an auth client.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    InitialSession(Option<Session>),
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(Session),
    PasswordRecovery(Session),
}

impl AuthEvent {
    /// The live session carried by this event, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::InitialSession(session) => session.as_ref(),
            AuthEvent::SignedIn(session)
            | AuthEvent::TokenRefreshed(session)
            | AuthEvent::UserUpdated(session)
            | AuthEvent::PasswordRecovery(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::InitialSession(_) => "INITIAL_SESSION",
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated(_) => "USER_UPDATED",
            AuthEvent::PasswordRecovery(_) => "PASSWORD_RECOVERY",
        }
    }
}

/// One-time token kinds accepted by `verify_otp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpType {
    Recovery,
}

impl OtpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpType::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }
}

/// Credentials and metadata for a new account.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Stored session, refreshed when close to expiry.
    async fn get_session(&self) -> Result<Option<Session>, ServiceError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ServiceError>;

    /// Returns the created identity when the backend reports one.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<Identity>, ServiceError>;

    /// Provider authorization URL for a PKCE sign-in.
    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String;

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, ServiceError>;

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ServiceError>;

    async fn verify_otp(&self, token_hash: &str, kind: OtpType) -> Result<Session, ServiceError>;

    /// Change the password of the signed-in user.
    async fn update_password(&self, password: &str) -> Result<(), ServiceError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ServiceError>;

    /// Revoke the session remotely. The local session is dropped even when
    /// the remote call fails.
    async fn sign_out(&self) -> Result<(), ServiceError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[async_trait]
pub trait DataApi: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, ServiceError>;

    /// Insert a profile unless one already exists for the id.
    async fn insert_profile(&self, profile: &NewProfile) -> Result<(), ServiceError>;

    /// Insert a profile, or overwrite the given fields of an existing one.
    async fn save_profile(&self, profile: &NewProfile) -> Result<(), ServiceError>;

    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError>;

    /// Chapters ordered by `order` ascending.
    async fn list_chapters(&self, published_only: bool) -> Result<Vec<Chapter>, ServiceError>;

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, ServiceError>;

    async fn insert_chapter(&self, draft: &ChapterDraft) -> Result<Chapter, ServiceError>;

    async fn update_chapter(&self, id: &str, draft: &ChapterDraft)
        -> Result<Chapter, ServiceError>;

    async fn delete_chapter(&self, id: &str) -> Result<(), ServiceError>;

    async fn watched_chapter_ids(&self, user_id: &str) -> Result<Vec<String>, ServiceError>;

    /// Insert or replace the row for `(user_id, chapter_id)`.
    async fn upsert_progress(&self, progress: &Progress) -> Result<(), ServiceError>;

    /// All watched rows, for the admin progress report.
    async fn list_watched_progress(&self) -> Result<Vec<Progress>, ServiceError>;
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Store an object; returns its path inside the bucket.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceError>;

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, ServiceError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), ServiceError>;
}

/// A full backend client: auth, data and storage sharing one session.
pub trait Backend: AuthApi + DataApi + StorageApi {}

impl<T: AuthApi + DataApi + StorageApi> Backend for T {}

/// Creates one backend client per browser session.
pub trait BackendFactory: Send + Sync {
    fn connect(&self) -> Arc<dyn Backend>;
}

/// Percent-encode each segment of an object path.
pub(crate) fn encode_object_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
