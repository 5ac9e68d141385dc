// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth event subscription that keeps the store in sync with the client.

use super::hydrator::hydrate;
use super::store::SessionStore;
use crate::backend::{AuthEvent, Backend};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Running listener task. Dropping it unsubscribes.
pub struct AuthListener {
    handle: JoinHandle<()>,
}

impl AuthListener {
    /// Start listening on an already-open subscription.
    ///
    /// Subscribe before bootstrapping so no event between the two is lost.
    pub fn spawn(
        backend: Arc<dyn Backend>,
        store: Arc<SessionStore>,
        mut events: broadcast::Receiver<AuthEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => apply_event(backend.as_ref(), &store, event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth listener lagged behind events");
                    }
                    Err(RecvError::Closed) => break,
                }
                if !store.is_mounted() {
                    break;
                }
            }
            tracing::debug!("Auth listener stopped");
        });

        Self { handle }
    }
}

impl Drop for AuthListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn apply_event(backend: &dyn Backend, store: &SessionStore, event: AuthEvent) {
    tracing::debug!(event = event.name(), "Auth state changed");
    let ticket = store.ticket();
    let user = match event.session() {
        Some(session) => Some(hydrate(backend, &session.user).await),
        None => None,
    };
    store.commit(ticket, user);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthApi, MemoryStore};
    use crate::session::store::AuthState;
    use std::time::Duration;

    async fn wait_for<F>(store: &SessionStore, f: F) -> AuthState
    where
        F: Fn(&AuthState) -> bool,
    {
        let mut rx = store.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| f(s)))
            .await
            .expect("state change")
            .unwrap()
            .clone();
        state
    }

    #[tokio::test]
    async fn test_sign_in_event_hydrates_user() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let client = Arc::new(memory.client());
        let store = Arc::new(SessionStore::new());
        let _listener = AuthListener::spawn(client.clone(), store.clone(), client.subscribe());

        client
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();

        let state = wait_for(&store, |s| s.user().is_some()).await;
        assert_eq!(state.user().map(|u| u.name.as_str()), Some("Ana"));
    }

    #[tokio::test]
    async fn test_sign_out_event_clears_user() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let client = Arc::new(memory.client());
        let store = Arc::new(SessionStore::new());
        let _listener = AuthListener::spawn(client.clone(), store.clone(), client.subscribe());

        client
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();
        wait_for(&store, |s| s.user().is_some()).await;

        client.sign_out().await.unwrap();
        let state = wait_for(&store, |s| *s == AuthState::SignedOut).await;
        assert_eq!(state, AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_dropped_listener_stops_updating() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let client = Arc::new(memory.client());
        let store = Arc::new(SessionStore::new());
        let listener = AuthListener::spawn(client.clone(), store.clone(), client.subscribe());
        drop(listener);
        tokio::task::yield_now().await;

        client
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.is_loading());
    }
}
