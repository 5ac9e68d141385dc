// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live browser sessions, keyed by the id carried in the session cookie.

use super::context::{AuthContext, ContextSettings};
use crate::backend::BackendFactory;
use crate::crypto;
use crate::flows::RecoveryFlow;
use crate::time_utils::unix_now;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// State kept for one browser between requests.
pub struct BrowserSession {
    id: String,
    context: AuthContext,
    recovery: Mutex<RecoveryFlow>,
    /// Unix seconds of the last request
    last_seen: AtomicI64,
}

impl BrowserSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    pub fn recovery(&self) -> &Mutex<RecoveryFlow> {
        &self.recovery
    }

    pub fn touch(&self) {
        self.last_seen.store(unix_now(), Ordering::Relaxed);
    }

    fn idle_secs(&self, now: i64) -> i64 {
        now - self.last_seen.load(Ordering::Relaxed)
    }
}

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<BrowserSession>>,
    factory: Arc<dyn BackendFactory>,
    settings: ContextSettings,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>, settings: ContextSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
            settings,
        }
    }

    /// Open a new browser session with its own backend client.
    pub fn create(&self) -> anyhow::Result<Arc<BrowserSession>> {
        let id = crypto::random_token(crypto::TOKEN_BYTES)?;
        let context = AuthContext::start(self.factory.connect(), self.settings.clone());
        let session = Arc::new(BrowserSession {
            id: id.clone(),
            context,
            recovery: Mutex::new(RecoveryFlow::new()),
            last_seen: AtomicI64::new(unix_now()),
        });
        self.sessions.insert(id, session.clone());
        tracing::debug!(sessions = self.sessions.len(), "Browser session opened");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<BrowserSession>> {
        let session = self.sessions.get(id).map(|s| s.value().clone())?;
        session.touch();
        Some(session)
    }

    /// Forget a browser session. Its store accepts no further writes.
    pub fn remove(&self, id: &str) -> Option<Arc<BrowserSession>> {
        let (_, session) = self.sessions.remove(id)?;
        session.context.store().unmount();
        Some(session)
    }

    /// Drop idle sessions: after `ttl` when signed in, after `anonymous_ttl`
    /// otherwise. Returns how many were dropped.
    pub fn prune_idle(&self, ttl: Duration, anonymous_ttl: Duration) -> usize {
        let now = unix_now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            let limit = if session.context.store().user().is_some() {
                ttl
            } else {
                anonymous_ttl
            };
            let keep = session.idle_secs(now) <= limit.as_secs() as i64;
            if !keep {
                session.context.store().unmount();
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use crate::forms::LoginForm;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(MemoryStore::new()),
            ContextSettings {
                site_url: "http://localhost:5173".to_string(),
                bootstrap_timeout: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let registry = registry();
        let session = registry.create().unwrap();

        let found = registry.get(session.id()).expect("registered");
        assert!(Arc::ptr_eq(&session, &found));

        registry.remove(session.id());
        assert!(registry.get(session.id()).is_none());
        assert!(!session.context().store().is_mounted());
    }

    #[tokio::test]
    async fn test_sessions_have_distinct_ids() {
        let registry = registry();
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_idle() {
        let registry = registry();
        let stale = registry.create().unwrap();
        let fresh = registry.create().unwrap();
        stale.last_seen.store(unix_now() - 100, Ordering::Relaxed);

        assert_eq!(
            registry.prune_idle(Duration::from_secs(50), Duration::from_secs(50)),
            1
        );
        assert!(registry.get(stale.id()).is_none());
        assert!(registry.get(fresh.id()).is_some());
    }

    #[tokio::test]
    async fn test_anonymous_sessions_pruned_sooner() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let registry = SessionRegistry::new(
            Arc::new(memory.clone()),
            ContextSettings {
                site_url: "http://localhost:5173".to_string(),
                bootstrap_timeout: Duration::from_secs(1),
            },
        );
        let anonymous = registry.create().unwrap();
        let signed_in = registry.create().unwrap();
        signed_in
            .context()
            .sign_in(&LoginForm {
                email: "ana@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        anonymous.context().ready().await;

        let an_hour_ago = unix_now() - 3600;
        anonymous.last_seen.store(an_hour_ago, Ordering::Relaxed);
        signed_in.last_seen.store(an_hour_ago, Ordering::Relaxed);

        assert_eq!(
            registry.prune_idle(Duration::from_secs(86_400), Duration::from_secs(900)),
            1
        );
        assert!(registry.get(anonymous.id()).is_none());
        assert!(registry.get(signed_in.id()).is_some());
    }
}
