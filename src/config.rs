// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Supabase project URL
    pub supabase_url: String,
    /// Public anon key sent with every backend request
    pub supabase_anon_key: String,
    /// Public site origin used for auth redirect links
    pub site_url: String,
    /// Server port
    pub port: u16,
    /// Upper bound on session bootstrap before the app stops loading
    pub bootstrap_timeout: Duration,
    /// Pause between a successful password reset and the redirect
    pub reset_redirect_delay: Duration,
    /// Browser sessions idle longer than this are dropped
    pub session_idle_ttl: Duration,
    /// Shorter idle limit for sessions with no signed-in user
    pub anonymous_session_ttl: Duration,

    // --- Secrets ---
    /// HMAC key for browser session cookies (raw bytes)
    pub session_signing_key: Vec<u8>,
    /// Project JWT secret; when set, tokens from recovery links are verified
    pub supabase_jwt_secret: Option<Vec<u8>>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            site_url: "http://localhost:5173".to_string(),
            port: 8080,
            bootstrap_timeout: Duration::from_secs(10),
            reset_redirect_delay: Duration::from_millis(2000),
            session_idle_ttl: Duration::from_secs(86_400),
            anonymous_session_ttl: Duration::from_secs(900),
            session_signing_key: b"test_session_key_32_bytes_min!!".to_vec(),
            supabase_jwt_secret: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            site_url: env::var("SITE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080)?,
            bootstrap_timeout: Duration::from_secs(parse_or("BOOTSTRAP_TIMEOUT_SECS", 10)?),
            reset_redirect_delay: Duration::from_millis(parse_or("RESET_REDIRECT_DELAY_MS", 2000)?),
            session_idle_ttl: Duration::from_secs(parse_or("SESSION_IDLE_TTL_SECS", 86_400)?),
            anonymous_session_ttl: Duration::from_secs(parse_or("ANON_SESSION_TTL_SECS", 900)?),

            session_signing_key: required("SESSION_SIGNING_KEY")?.into_bytes(),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(String::into_bytes),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
