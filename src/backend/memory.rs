// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backend for tests and offline development.
//!
//! A [`MemoryStore`] holds the shared tables; each [`MemoryBackend`] client
//! created from it keeps its own session and event channel, like one
//! browser talking to the hosted backend. Failure switches and call
//! counters are shared so tests can inject faults and assert on traffic.

use super::{
    AuthApi, AuthEvent, Backend, BackendFactory, DataApi, OAuthProvider, OtpType, ServiceError,
    SignUpRequest, StorageApi, AUTH_EVENT_CAPACITY,
};
use crate::crypto;
use crate::models::user::UserMetadata;
use crate::models::{Chapter, ChapterDraft, Identity, NewProfile, Profile, Progress, Session};
use crate::time_utils::{now_rfc3339, unix_now};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

const SESSION_LIFETIME_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    password: Option<String>,
    identity: Identity,
}

#[derive(Default)]
struct Tables {
    /// Keyed by lowercase email
    accounts: DashMap<String, Account>,
    /// Access token -> user id
    access_tokens: DashMap<String, String>,
    /// Token hash -> user id
    recovery_tokens: DashMap<String, String>,
    /// Auth code -> (user id, code challenge)
    oauth_codes: DashMap<String, (String, String)>,
    profiles: DashMap<String, Profile>,
    chapters: DashMap<String, Chapter>,
    progress: DashMap<(String, String), Progress>,
    /// (bucket, path) -> (bytes, content type)
    objects: DashMap<(String, String), (Vec<u8>, String)>,
    next_id: AtomicU64,
}

/// Failure injection switches.
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_get_session: AtomicBool,
    /// `get_session` never resolves.
    pub hang_get_session: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub fail_profile_lookup: AtomicBool,
    pub fail_profile_insert: AtomicBool,
    pub fail_chapters: AtomicBool,
    pub fail_signed_url: AtomicBool,
    pub fail_progress: AtomicBool,
    pub fail_reset_email: AtomicBool,
    /// Artificial latency for `get_session`, in milliseconds.
    pub get_session_delay_ms: AtomicU64,
    /// Artificial latency for `get_profile`, in milliseconds.
    pub profile_lookup_delay_ms: AtomicU64,
}

impl Faults {
    pub fn enable(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub get_session: AtomicUsize,
    pub sign_in: AtomicUsize,
    pub sign_up: AtomicUsize,
    pub update_password: AtomicUsize,
    pub reset_password: AtomicUsize,
    pub sign_out: AtomicUsize,
    pub profile_inserts: AtomicUsize,
    pub profile_saves: AtomicUsize,
    pub progress_upserts: AtomicUsize,
}

impl CallCounts {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Shared in-memory tables plus fault switches.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
    faults: Arc<Faults>,
    calls: Arc<CallCounts>,
    /// Sign-up returns a session right away instead of awaiting confirmation
    auto_confirm: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn set_auto_confirm(&self, enabled: bool) {
        self.auto_confirm.store(enabled, Ordering::SeqCst);
    }

    /// A new client with no session.
    pub fn client(&self) -> MemoryBackend {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        MemoryBackend {
            store: self.clone(),
            session: RwLock::new(None),
            events,
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.tables.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }

    // ─── Seeding helpers ─────────────────────────────────────────

    /// Register a confirmed email/password account.
    pub fn add_account(&self, email: &str, password: &str, name: &str) -> Identity {
        let metadata = UserMetadata {
            full_name: None,
            name: Some(name.to_string()).filter(|n| !n.is_empty()),
        };
        self.insert_account(email, Some(password.to_string()), metadata)
    }

    /// Register an account that only signs in through an OAuth provider.
    pub fn add_oauth_account(&self, email: &str, full_name: &str) -> Identity {
        let metadata = UserMetadata {
            full_name: Some(full_name.to_string()),
            name: None,
        };
        self.insert_account(email, None, metadata)
    }

    fn insert_account(
        &self,
        email: &str,
        password: Option<String>,
        metadata: UserMetadata,
    ) -> Identity {
        let identity = Identity {
            id: self.next_id("user"),
            email: Some(email.to_string()),
            metadata,
            created_at: now_rfc3339(),
        };
        self.tables.accounts.insert(
            email.to_lowercase(),
            Account {
                password,
                identity: identity.clone(),
            },
        );
        identity
    }

    pub fn put_profile(&self, profile: Profile) {
        self.tables.profiles.insert(profile.id.clone(), profile);
    }

    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.tables.profiles.get(id).map(|p| p.value().clone())
    }

    pub fn profile_count(&self) -> usize {
        self.tables.profiles.len()
    }

    pub fn put_chapter(&self, chapter: Chapter) {
        self.tables.chapters.insert(chapter.id.clone(), chapter);
    }

    pub fn chapter_count(&self) -> usize {
        self.tables.chapters.len()
    }

    pub fn progress_for(&self, user_id: &str) -> Vec<Progress> {
        self.tables
            .progress
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn has_object(&self, bucket: &str, path: &str) -> bool {
        self.tables
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    /// Issue a one-time recovery token hash, as a reset email would carry.
    pub fn issue_recovery_token(&self, email: &str) -> Option<String> {
        let account = self.tables.accounts.get(&email.to_lowercase())?;
        let token = format!("recovery-{}", self.next_id("token"));
        self.tables
            .recovery_tokens
            .insert(token.clone(), account.identity.id.clone());
        Some(token)
    }

    /// Issue an access/refresh token pair for an account.
    pub fn issue_session_tokens(&self, email: &str) -> Option<(String, String)> {
        let identity = self.tables.accounts.get(&email.to_lowercase())?.identity.clone();
        let session = self.mint_session(&identity);
        Some((session.access_token, session.refresh_token))
    }

    /// Issue a provider authorization code bound to a PKCE challenge.
    pub fn issue_oauth_code(&self, email: &str, code_challenge: &str) -> Option<String> {
        let account = self.tables.accounts.get(&email.to_lowercase())?;
        let code = self.next_id("code");
        self.tables.oauth_codes.insert(
            code.clone(),
            (account.identity.id.clone(), code_challenge.to_string()),
        );
        Some(code)
    }

    fn identity_by_id(&self, user_id: &str) -> Option<Identity> {
        self.tables
            .accounts
            .iter()
            .find(|entry| entry.value().identity.id == user_id)
            .map(|entry| entry.value().identity.clone())
    }

    fn mint_session(&self, identity: &Identity) -> Session {
        let access_token = self.next_id("access");
        self.tables
            .access_tokens
            .insert(access_token.clone(), identity.id.clone());
        Session {
            access_token,
            refresh_token: self.next_id("refresh"),
            expires_at: unix_now() + SESSION_LIFETIME_SECS,
            user: identity.clone(),
        }
    }
}

impl BackendFactory for MemoryStore {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(self.client())
    }
}

/// One client of a [`MemoryStore`].
pub struct MemoryBackend {
    store: MemoryStore,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryBackend {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Publish an auth event to this client's subscribers.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn current_session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    fn install(&self, session: Session, event: fn(Session) -> AuthEvent) -> Session {
        if let Ok(mut slot) = self.session.write() {
            *slot = Some(session.clone());
        }
        self.emit(event(session.clone()));
        session
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.session.write() {
            *slot = None;
        }
        self.emit(AuthEvent::SignedOut);
    }

    fn tables(&self) -> &Tables {
        &self.store.tables
    }

    fn faults(&self) -> &Faults {
        &self.store.faults
    }

    fn calls(&self) -> &CallCounts {
        &self.store.calls
    }
}

fn flag(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

async fn delay(ms: &AtomicU64) {
    let ms = ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, ServiceError> {
        self.calls().get_session.fetch_add(1, Ordering::SeqCst);
        if flag(&self.faults().hang_get_session) {
            futures_util::future::pending::<()>().await;
        }
        delay(&self.faults().get_session_delay_ms).await;
        if flag(&self.faults().fail_get_session) {
            return Err(ServiceError::Transient("session storage unavailable".into()));
        }
        Ok(self.current_session())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ServiceError> {
        self.calls().sign_in.fetch_add(1, Ordering::SeqCst);
        let identity = self
            .tables()
            .accounts
            .get(&email.to_lowercase())
            .filter(|account| account.password.as_deref() == Some(password))
            .map(|account| account.identity.clone())
            .ok_or_else(|| ServiceError::Auth("Invalid login credentials".into()))?;

        let session = self.store.mint_session(&identity);
        Ok(self.install(session, AuthEvent::SignedIn))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<Identity>, ServiceError> {
        self.calls().sign_up.fetch_add(1, Ordering::SeqCst);
        if self
            .tables()
            .accounts
            .contains_key(&request.email.to_lowercase())
        {
            return Err(ServiceError::Auth("User already registered".into()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Auth(
                "Password should be at least 6 characters.".into(),
            ));
        }

        let identity = self
            .store
            .add_account(&request.email, &request.password, &request.name);
        if flag(&self.store.auto_confirm) {
            let session = self.store.mint_session(&identity);
            self.install(session, AuthEvent::SignedIn);
        }
        Ok(Some(identity))
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "memory://auth/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            provider.as_str(),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        )
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, ServiceError> {
        let (_, (user_id, challenge)) = self
            .tables()
            .oauth_codes
            .remove(auth_code)
            .ok_or_else(|| ServiceError::Auth("invalid flow state, no valid flow state found".into()))?;

        if crypto::code_challenge(code_verifier) != challenge {
            return Err(ServiceError::Auth("code challenge does not match".into()));
        }

        let identity = self
            .store
            .identity_by_id(&user_id)
            .ok_or(ServiceError::NotFound)?;
        let session = self.store.mint_session(&identity);
        Ok(self.install(session, AuthEvent::SignedIn))
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ServiceError> {
        let user_id = self
            .tables()
            .access_tokens
            .get(access_token)
            .map(|id| id.value().clone())
            .ok_or_else(|| ServiceError::Auth("Invalid JWT".into()))?;
        let identity = self
            .store
            .identity_by_id(&user_id)
            .ok_or_else(|| ServiceError::Auth("User not found".into()))?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: unix_now() + SESSION_LIFETIME_SECS,
            user: identity,
        };
        Ok(self.install(session, AuthEvent::SignedIn))
    }

    async fn verify_otp(&self, token_hash: &str, _kind: OtpType) -> Result<Session, ServiceError> {
        let (_, user_id) = self
            .tables()
            .recovery_tokens
            .remove(token_hash)
            .ok_or_else(|| ServiceError::Auth("Token has expired or is invalid".into()))?;
        let identity = self
            .store
            .identity_by_id(&user_id)
            .ok_or(ServiceError::NotFound)?;

        let session = self.store.mint_session(&identity);
        Ok(self.install(session, AuthEvent::PasswordRecovery))
    }

    async fn update_password(&self, password: &str) -> Result<(), ServiceError> {
        self.calls().update_password.fetch_add(1, Ordering::SeqCst);
        let session = self
            .current_session()
            .ok_or_else(|| ServiceError::Auth("Auth session missing!".into()))?;

        let email = session.user.email_or_empty().to_lowercase();
        if let Some(mut account) = self.tables().accounts.get_mut(&email) {
            account.password = Some(password.to_string());
        }
        self.emit(AuthEvent::UserUpdated(session));
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        _redirect_to: &str,
    ) -> Result<(), ServiceError> {
        self.calls().reset_password.fetch_add(1, Ordering::SeqCst);
        if flag(&self.faults().fail_reset_email) {
            return Err(ServiceError::Transient("email provider unavailable".into()));
        }
        // Unknown addresses succeed silently.
        let _ = self.store.issue_recovery_token(email);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        self.calls().sign_out.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = self.current_session() {
            self.tables().access_tokens.remove(&session.access_token);
        }
        self.clear();
        if flag(&self.faults().fail_sign_out) {
            return Err(ServiceError::Transient("logout request failed".into()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataApi for MemoryBackend {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, ServiceError> {
        delay(&self.faults().profile_lookup_delay_ms).await;
        if flag(&self.faults().fail_profile_lookup) {
            return Err(ServiceError::Transient("profiles unavailable".into()));
        }
        Ok(self.store.profile(id))
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<(), ServiceError> {
        self.calls().profile_inserts.fetch_add(1, Ordering::SeqCst);
        if flag(&self.faults().fail_profile_insert) {
            return Err(ServiceError::Transient("profiles unavailable".into()));
        }
        self.tables()
            .profiles
            .entry(profile.id.clone())
            .or_insert_with(|| Profile {
                id: profile.id.clone(),
                email: profile.email.clone(),
                name: profile.name.clone(),
                phone: profile.phone.clone(),
                role: profile.role,
                created_at: now_rfc3339(),
            });
        Ok(())
    }

    async fn save_profile(&self, profile: &NewProfile) -> Result<(), ServiceError> {
        self.calls().profile_saves.fetch_add(1, Ordering::SeqCst);
        if flag(&self.faults().fail_profile_insert) {
            return Err(ServiceError::Transient("profiles unavailable".into()));
        }
        self.tables()
            .profiles
            .entry(profile.id.clone())
            .and_modify(|existing| {
                existing.email = profile.email.clone();
                existing.name = profile.name.clone();
                existing.role = profile.role;
                // An absent phone is left out of the payload.
                if profile.phone.is_some() {
                    existing.phone = profile.phone.clone();
                }
            })
            .or_insert_with(|| Profile {
                id: profile.id.clone(),
                email: profile.email.clone(),
                name: profile.name.clone(),
                phone: profile.phone.clone(),
                role: profile.role,
                created_at: now_rfc3339(),
            });
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError> {
        let mut profiles: Vec<Profile> = self
            .tables()
            .profiles
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(profiles)
    }

    async fn list_chapters(&self, published_only: bool) -> Result<Vec<Chapter>, ServiceError> {
        if flag(&self.faults().fail_chapters) {
            return Err(ServiceError::Transient("chapters unavailable".into()));
        }
        let mut chapters: Vec<Chapter> = self
            .tables()
            .chapters
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|c| !published_only || c.is_published)
            .collect();
        chapters.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(chapters)
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, ServiceError> {
        if flag(&self.faults().fail_chapters) {
            return Err(ServiceError::Transient("chapters unavailable".into()));
        }
        Ok(self.tables().chapters.get(id).map(|c| c.value().clone()))
    }

    async fn insert_chapter(&self, draft: &ChapterDraft) -> Result<Chapter, ServiceError> {
        let chapter = Chapter {
            id: self.store.next_id("chapter"),
            title: draft.title.clone(),
            description: draft.description.clone(),
            video_file_path: draft.video_file_path.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            duration: draft.duration.clone(),
            order: draft
                .order
                .unwrap_or(self.tables().chapters.len() as i32 + 1),
            is_published: draft.is_published,
            created_at: now_rfc3339(),
        };
        self.store.put_chapter(chapter.clone());
        Ok(chapter)
    }

    async fn update_chapter(
        &self,
        id: &str,
        draft: &ChapterDraft,
    ) -> Result<Chapter, ServiceError> {
        let mut entry = self
            .tables()
            .chapters
            .get_mut(id)
            .ok_or(ServiceError::NotFound)?;
        let updated = draft.apply_to(&entry);
        *entry = updated.clone();
        Ok(updated)
    }

    async fn delete_chapter(&self, id: &str) -> Result<(), ServiceError> {
        self.tables().chapters.remove(id);
        Ok(())
    }

    async fn watched_chapter_ids(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        if flag(&self.faults().fail_progress) {
            return Err(ServiceError::Transient("progress unavailable".into()));
        }
        Ok(self
            .store
            .progress_for(user_id)
            .into_iter()
            .filter(|p| p.watched)
            .map(|p| p.chapter_id)
            .collect())
    }

    async fn upsert_progress(&self, progress: &Progress) -> Result<(), ServiceError> {
        self.calls().progress_upserts.fetch_add(1, Ordering::SeqCst);
        if flag(&self.faults().fail_progress) {
            return Err(ServiceError::Transient("progress unavailable".into()));
        }
        // Merge like PostgREST: columns absent from the payload keep their value.
        let key = (progress.user_id.clone(), progress.chapter_id.clone());
        let mut row = progress.clone();
        if row.watch_time.is_none() {
            row.watch_time = self
                .tables()
                .progress
                .get(&key)
                .and_then(|existing| existing.watch_time);
        }
        self.tables().progress.insert(key, row);
        Ok(())
    }

    async fn list_watched_progress(&self) -> Result<Vec<Progress>, ServiceError> {
        Ok(self
            .tables()
            .progress
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|p| p.watched)
            .collect())
    }
}

#[async_trait]
impl StorageApi for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceError> {
        let key = (bucket.to_string(), path.to_string());
        if self.tables().objects.contains_key(&key) {
            return Err(ServiceError::Conflict("The resource already exists".into()));
        }
        self.tables()
            .objects
            .insert(key, (bytes, content_type.to_string()));
        Ok(path.to_string())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, ServiceError> {
        if flag(&self.faults().fail_signed_url) {
            return Err(ServiceError::Transient("signing unavailable".into()));
        }
        if !self.store.has_object(bucket, path) {
            return Err(ServiceError::NotFound);
        }
        Ok(format!(
            "memory://storage/sign/{}/{}?expires_in={}",
            bucket,
            super::encode_object_path(path),
            expires_in_secs
        ))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "memory://storage/public/{}/{}",
            bucket,
            super::encode_object_path(path)
        )
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), ServiceError> {
        for path in paths {
            self.tables()
                .objects
                .remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
