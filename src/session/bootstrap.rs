// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Initial session resolution for a new browser session.

use super::hydrator::hydrate;
use super::store::SessionStore;
use crate::backend::Backend;
use std::sync::Arc;
use std::time::Duration;

/// Resolve the stored session into the store, leaving `Loading` within
/// `timeout` no matter what the backend does.
///
/// The lookup keeps running after the timeout; a late result still commits
/// unless a newer writer got there first.
pub async fn bootstrap(backend: Arc<dyn Backend>, store: Arc<SessionStore>, timeout: Duration) {
    let ticket = store.ticket();
    let writer = store.clone();

    let task = tokio::spawn(async move {
        let user = match backend.get_session().await {
            Ok(Some(session)) => Some(hydrate(backend.as_ref(), &session.user).await),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session");
                None
            }
        };
        writer.commit(ticket, user);
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Session bootstrap task failed"),
        Err(_) => tracing::warn!(
            timeout_ms = timeout.as_millis() as u64,
            "Session bootstrap timed out"
        ),
    }

    store.finish_loading();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Faults;
    use crate::backend::AuthApi;
    use crate::backend::MemoryStore;
    use crate::session::store::AuthState;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_no_session_resolves_signed_out() {
        let store = Arc::new(SessionStore::new());
        let backend: Arc<dyn Backend> = Arc::new(MemoryStore::new().client());

        bootstrap(backend, store.clone(), Duration::from_secs(1)).await;
        assert_eq!(store.current(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_existing_session_resolves_user() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let client = memory.client();
        client
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();

        let store = Arc::new(SessionStore::new());
        bootstrap(Arc::new(client), store.clone(), Duration::from_secs(1)).await;

        let user = store.user().expect("signed in");
        assert_eq!(user.name, "Ana");
        assert_eq!(memory.profile_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_resolves_signed_out() {
        let memory = MemoryStore::new();
        Faults::enable(&memory.faults().fail_get_session);
        let store = Arc::new(SessionStore::new());

        bootstrap(Arc::new(memory.client()), store.clone(), Duration::from_secs(1)).await;
        assert_eq!(store.current(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_hanging_backend_stops_loading_at_timeout() {
        let memory = MemoryStore::new();
        Faults::enable(&memory.faults().hang_get_session);
        let store = Arc::new(SessionStore::new());

        let started = tokio::time::Instant::now();
        bootstrap(
            Arc::new(memory.client()),
            store.clone(),
            Duration::from_millis(50),
        )
        .await;

        assert!(!store.is_loading());
        assert_eq!(store.current(), AuthState::SignedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_late_result_still_commits() {
        let memory = MemoryStore::new();
        memory.add_account("ana@example.com", "secret1", "Ana");
        let client = memory.client();
        client
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();
        memory
            .faults()
            .get_session_delay_ms
            .store(100, Ordering::SeqCst);

        let store = Arc::new(SessionStore::new());
        bootstrap(Arc::new(client), store.clone(), Duration::from_millis(10)).await;
        assert_eq!(store.current(), AuthState::SignedOut);

        let mut rx = store.subscribe();
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.user().is_some()),
        )
        .await
        .expect("late commit")
        .unwrap()
        .clone();
        assert_eq!(state.user().map(|u| u.name.as_str()), Some("Ana"));
    }
}
