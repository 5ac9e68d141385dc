// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-out: remote revoke, unconditional local clear, hard navigation.

use super::store::SessionStore;
use crate::backend::AuthApi;
use serde::Serialize;

/// Full-page navigation the client must perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub location: String,
    /// Discard all client state, as a full page load does
    pub reload: bool,
}

impl Navigation {
    pub fn hard(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reload: true,
        }
    }
}

/// Sign out remotely and locally. Remote failures are logged only.
pub async fn sign_out<A: AuthApi + ?Sized>(auth: &A, store: &SessionStore) -> Navigation {
    if let Err(e) = auth.sign_out().await {
        tracing::warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
    }
    store.clear();
    Navigation::hard("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{CallCounts, Faults};
    use crate::backend::MemoryStore;
    use crate::models::{CurrentUser, Identity};
    use crate::session::store::AuthState;

    fn signed_in_store(identity: &Identity) -> SessionStore {
        let store = SessionStore::new();
        let ticket = store.ticket();
        store.commit(ticket, Some(CurrentUser::from_identity(identity)));
        store
    }

    #[tokio::test]
    async fn test_sign_out_clears_user() {
        let memory = MemoryStore::new();
        let identity = memory.add_account("ana@example.com", "secret1", "Ana");
        let client = memory.client();
        client
            .sign_in_with_password("ana@example.com", "secret1")
            .await
            .unwrap();
        let store = signed_in_store(&identity);

        let nav = sign_out(&client, &store).await;

        assert_eq!(nav, Navigation::hard("/"));
        assert_eq!(store.current(), AuthState::SignedOut);
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_sign_out_still_clears_user() {
        let memory = MemoryStore::new();
        let identity = memory.add_account("ana@example.com", "secret1", "Ana");
        Faults::enable(&memory.faults().fail_sign_out);
        let store = signed_in_store(&identity);

        let nav = sign_out(&memory.client(), &store).await;

        assert_eq!(nav.location, "/");
        assert!(nav.reload);
        assert_eq!(store.user(), None);
        assert_eq!(CallCounts::count(&memory.calls().sign_out), 1);
    }
}
