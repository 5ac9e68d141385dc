// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase client for auth (GoTrue), tables (PostgREST) and storage.
//!
//! Handles:
//! - Password, PKCE and recovery-token sign-in
//! - Session refresh when the access token is close to expiry
//! - Profile, chapter and progress queries
//! - Object upload, signed/public URLs and removal

use super::{
    encode_object_path, tables, AuthApi, AuthEvent, Backend, BackendFactory, DataApi,
    OAuthProvider, OtpType, ServiceError, SignUpRequest, StorageApi, AUTH_EVENT_CAPACITY,
};
use crate::config::Config;
use crate::models::{Chapter, ChapterDraft, Identity, NewProfile, Profile, Progress, Session};
use crate::time_utils::unix_now;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
/// Refresh the access token when it expires within this many seconds.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Connection settings shared by every client.
pub struct SupabaseHttp {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    jwt_secret: Option<Vec<u8>>,
}

/// Builds one [`SupabaseClient`] per browser session over a shared
/// HTTP connection pool.
#[derive(Clone)]
pub struct SupabaseFactory {
    shared: Arc<SupabaseHttp>,
}

impl SupabaseFactory {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed building Supabase HTTP client: {}", e))?;

        Ok(Self {
            shared: Arc::new(SupabaseHttp {
                http,
                base_url: config.supabase_url.trim_end_matches('/').to_string(),
                anon_key: config.supabase_anon_key.clone(),
                jwt_secret: config.supabase_jwt_secret.clone(),
            }),
        })
    }

    pub fn client(&self) -> SupabaseClient {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        SupabaseClient {
            shared: self.shared.clone(),
            session: RwLock::new(None),
            events,
        }
    }
}

impl BackendFactory for SupabaseFactory {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(self.client())
    }
}

/// Supabase client holding one browser's auth session.
pub struct SupabaseClient {
    shared: Arc<SupabaseHttp>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

/// GoTrue token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| unix_now() + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Access token claims needed to restore a session from a link.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    exp: i64,
}

#[derive(Deserialize)]
struct ChapterIdRow {
    chapter_id: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

impl SupabaseClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.shared.base_url, path)
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Request with the project key, authorized as the signed-in user when
    /// a session exists.
    async fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let bearer = self
            .access_token()
            .await
            .unwrap_or_else(|| self.shared.anon_key.clone());
        self.shared
            .http
            .request(method, self.url(path))
            .header("apikey", &self.shared.anon_key)
            .bearer_auth(bearer)
    }

    fn emit(&self, event: AuthEvent) {
        tracing::debug!(event = event.name(), "Auth state change");
        let _ = self.events.send(event);
    }

    async fn install(&self, session: Session, event: fn(Session) -> AuthEvent) -> Session {
        *self.session.write().await = Some(session.clone());
        self.emit(event(session.clone()));
        session
    }

    async fn token_grant<B: Serialize + ?Sized>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<Session, ServiceError> {
        let response = self
            .shared
            .http
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.shared.anon_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let token: TokenResponse = check_response_json(response).await?;
        Ok(token.into_session())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ServiceError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        self.token_grant("refresh_token", &body).await
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, ServiceError> {
        let response = self
            .shared
            .http
            .get(self.url("/auth/v1/user"))
            .header("apikey", &self.shared.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;
        check_response_json(response).await
    }

    /// Read the expiry of an access token, verifying the signature when the
    /// project JWT secret is configured.
    fn access_token_expiry(&self, access_token: &str) -> Result<i64, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let key = match &self.shared.jwt_secret {
            Some(secret) => {
                validation.set_audience(&["authenticated"]);
                DecodingKey::from_secret(secret)
            }
            None => {
                validation.insecure_disable_signature_validation();
                validation.validate_aud = false;
                DecodingKey::from_secret(&[])
            }
        };

        decode::<AccessClaims>(access_token, &key, &validation)
            .map(|data| data.claims.exp)
            .map_err(|e| ServiceError::Auth(format!("Invalid JWT: {}", e)))
    }

    async fn rest_get<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ServiceError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/rest/v1/{}", table))
            .await
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        check_response_json(response).await
    }
}

#[async_trait]
impl AuthApi for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, ServiceError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        if session.expires_at - unix_now() > EXPIRY_MARGIN_SECS {
            return Ok(Some(session));
        }

        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => Ok(Some(
                self.install(refreshed, AuthEvent::TokenRefreshed).await,
            )),
            Err(ServiceError::Auth(msg)) => {
                tracing::info!(reason = %msg, "Stored session could not be refreshed");
                *self.session.write().await = None;
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ServiceError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let session = self.token_grant("password", &body).await?;
        Ok(self.install(session, AuthEvent::SignedIn).await)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<Identity>, ServiceError> {
        let body = serde_json::json!({
            "email": request.email,
            "password": request.password,
            "data": { "name": request.name },
        });

        let response = self
            .shared
            .http
            .post(self.url("/auth/v1/signup"))
            .header("apikey", &self.shared.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let value: serde_json::Value = check_response_json(response).await?;

        // Auto-confirming projects answer with a full session.
        if value.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(value)
                .map_err(|e| ServiceError::Decode(e.to_string()))?;
            let session = self.install(token.into_session(), AuthEvent::SignedIn).await;
            return Ok(Some(session.user));
        }

        if value.get("id").is_some() {
            let identity: Identity =
                serde_json::from_value(value).map_err(|e| ServiceError::Decode(e.to_string()))?;
            return Ok(Some(identity));
        }

        Ok(None)
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.shared.base_url,
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
        let body = serde_json::json!({ "auth_code": auth_code, "code_verifier": code_verifier });
        let session = self.token_grant("pkce", &body).await?;
        Ok(self.install(session, AuthEvent::SignedIn).await)
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ServiceError> {
        let expires_at = self.access_token_expiry(access_token)?;

        let session = if expires_at - unix_now() <= EXPIRY_MARGIN_SECS {
            self.refresh(refresh_token).await?
        } else {
            let user = self.fetch_user(access_token).await?;
            Session {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at,
                user,
            }
        };

        Ok(self.install(session, AuthEvent::SignedIn).await)
    }

    async fn verify_otp(&self, token_hash: &str, kind: OtpType) -> Result<Session, ServiceError> {
        let body = serde_json::json!({ "type": kind.as_str(), "token_hash": token_hash });
        let response = self
            .shared
            .http
            .post(self.url("/auth/v1/verify"))
            .header("apikey", &self.shared.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let token: TokenResponse = check_response_json(response).await?;
        Ok(self
            .install(token.into_session(), AuthEvent::PasswordRecovery)
            .await)
    }

    async fn update_password(&self, password: &str) -> Result<(), ServiceError> {
        let Some(access_token) = self.access_token().await else {
            return Err(ServiceError::Auth("Auth session missing!".into()));
        };

        let response = self
            .shared
            .http
            .put(self.url("/auth/v1/user"))
            .header("apikey", &self.shared.anon_key)
            .bearer_auth(&access_token)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .map_err(transport_error)?;
        let user: Identity = check_response_json(response).await?;

        let updated = {
            let mut slot = self.session.write().await;
            slot.as_mut().map(|session| {
                session.user = user;
                session.clone()
            })
        };
        if let Some(session) = updated {
            self.emit(AuthEvent::UserUpdated(session));
        }
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ServiceError> {
        let response = self
            .shared
            .http
            .post(self.url("/auth/v1/recover"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.shared.anon_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        let previous = self.session.write().await.take();
        self.emit(AuthEvent::SignedOut);

        let Some(session) = previous else {
            return Ok(());
        };

        let response = self
            .shared
            .http
            .post(self.url("/auth/v1/logout"))
            .header("apikey", &self.shared.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataApi for SupabaseClient {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, ServiceError> {
        let rows: Vec<Profile> = self
            .rest_get(
                tables::PROFILES,
                &[("select", "*".into()), ("id", format!("eq.{}", id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<(), ServiceError> {
        let response = self
            .request(reqwest::Method::POST, "/rest/v1/profiles")
            .await
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(profile)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }

    async fn save_profile(&self, profile: &NewProfile) -> Result<(), ServiceError> {
        let response = self
            .request(reqwest::Method::POST, "/rest/v1/profiles")
            .await
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(profile)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError> {
        self.rest_get(
            tables::PROFILES,
            &[("select", "*".into()), ("order", "created_at.asc".into())],
        )
        .await
    }

    async fn list_chapters(&self, published_only: bool) -> Result<Vec<Chapter>, ServiceError> {
        let mut query = vec![("select", "*".to_string()), ("order", "order.asc".to_string())];
        if published_only {
            query.push(("is_published", "eq.true".to_string()));
        }
        self.rest_get(tables::CHAPTERS, &query).await
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, ServiceError> {
        let rows: Vec<Chapter> = self
            .rest_get(
                tables::CHAPTERS,
                &[("select", "*".into()), ("id", format!("eq.{}", id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_chapter(&self, draft: &ChapterDraft) -> Result<Chapter, ServiceError> {
        let response = self
            .request(reqwest::Method::POST, "/rest/v1/chapters")
            .await
            .header("Prefer", "return=representation")
            .json(draft)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<Chapter> = check_response_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode("insert returned no rows".into()))
    }

    async fn update_chapter(
        &self,
        id: &str,
        draft: &ChapterDraft,
    ) -> Result<Chapter, ServiceError> {
        let response = self
            .request(reqwest::Method::PATCH, "/rest/v1/chapters")
            .await
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(draft)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<Chapter> = check_response_json(response).await?;
        rows.into_iter().next().ok_or(ServiceError::NotFound)
    }

    async fn delete_chapter(&self, id: &str) -> Result<(), ServiceError> {
        let response = self
            .request(reqwest::Method::DELETE, "/rest/v1/chapters")
            .await
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }

    async fn watched_chapter_ids(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        let rows: Vec<ChapterIdRow> = self
            .rest_get(
                tables::USER_PROGRESS,
                &[
                    ("select", "chapter_id".into()),
                    ("user_id", format!("eq.{}", user_id)),
                    ("watched", "eq.true".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.chapter_id).collect())
    }

    async fn upsert_progress(&self, progress: &Progress) -> Result<(), ServiceError> {
        let response = self
            .request(reqwest::Method::POST, "/rest/v1/user_progress")
            .await
            .query(&[("on_conflict", "user_id,chapter_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(progress)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }

    async fn list_watched_progress(&self) -> Result<Vec<Progress>, ServiceError> {
        self.rest_get(
            tables::USER_PROGRESS,
            &[("select", "*".into()), ("watched", "eq.true".into())],
        )
        .await
    }
}

#[async_trait]
impl StorageApi for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ServiceError> {
        let object = format!(
            "/storage/v1/object/{}/{}",
            bucket,
            encode_object_path(path)
        );
        let response = self
            .request(reqwest::Method::POST, &object)
            .await
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await?;
        Ok(path.to_string())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, ServiceError> {
        let object = format!(
            "/storage/v1/object/sign/{}/{}",
            bucket,
            encode_object_path(path)
        );
        let response = self
            .request(reqwest::Method::POST, &object)
            .await
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }))
            .send()
            .await
            .map_err(transport_error)?;
        let signed: SignedUrlResponse = check_response_json(response).await?;
        Ok(format!("{}/storage/v1{}", self.shared.base_url, signed.signed_url))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.shared.base_url,
            bucket,
            encode_object_path(path)
        )
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), ServiceError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/storage/v1/object/{}", bucket))
            .await
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response).await
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    ServiceError::Transient(e.to_string())
}

/// Pull the human-readable message out of a GoTrue/PostgREST/Storage
/// error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.to_string())
}

/// Map a non-success status to a service error.
fn status_error(status: reqwest::StatusCode, body: &str) -> ServiceError {
    let message = error_message(body);
    match status.as_u16() {
        400 | 401 | 403 | 422 => ServiceError::Auth(message),
        404 => ServiceError::NotFound,
        409 => ServiceError::Conflict(message),
        429 => {
            tracing::warn!("Supabase rate limit hit (429)");
            ServiceError::Transient(message)
        }
        _ => ServiceError::Transient(format!("HTTP {}: {}", status, message)),
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), ServiceError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| ServiceError::Decode(format!("JSON parse error: {}", e)))
}
