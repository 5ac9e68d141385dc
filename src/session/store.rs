// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Current User store shared by every writer of one browser session.
//!
//! Writers take a [`WriteTicket`] when they start work and commit with it
//! when done. A commit only lands if its ticket is newer than the last one
//! applied, so a slow bootstrap cannot overwrite a later sign-in. After
//! [`SessionStore::unmount`] nothing is written at all.

use crate::models::CurrentUser;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Authentication state of one browser session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum AuthState {
    Loading,
    SignedOut,
    SignedIn(CurrentUser),
}

impl AuthState {
    pub fn user(&self) -> Option<&CurrentUser> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            AuthState::Loading | AuthState::SignedOut => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }
}

/// Ordering token handed to a writer when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteTicket(u64);

pub struct SessionStore {
    state: watch::Sender<AuthState>,
    next_ticket: AtomicU64,
    /// Highest ticket committed so far
    applied: Mutex<u64>,
    mounted: AtomicBool,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            state,
            next_ticket: AtomicU64::new(0),
            applied: Mutex::new(0),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn ticket(&self) -> WriteTicket {
        WriteTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Commit a writer's result. Returns whether the write was applied.
    pub fn commit(&self, ticket: WriteTicket, user: Option<CurrentUser>) -> bool {
        if !self.is_mounted() {
            tracing::debug!(ticket = ticket.0, "Dropping write after teardown");
            return false;
        }

        let Ok(mut applied) = self.applied.lock() else {
            return false;
        };
        if ticket.0 <= *applied {
            tracing::debug!(
                ticket = ticket.0,
                applied = *applied,
                "Dropping superseded write"
            );
            return false;
        }
        *applied = ticket.0;

        let next = match user {
            Some(user) => AuthState::SignedIn(user),
            None => AuthState::SignedOut,
        };
        self.state.send_replace(next);
        true
    }

    /// Leave `Loading` as signed out unless a writer already resolved it.
    pub fn finish_loading(&self) {
        if !self.is_mounted() {
            return;
        }
        let changed = self.state.send_if_modified(|state| {
            if state.is_loading() {
                *state = AuthState::SignedOut;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!("Session bootstrap did not resolve, continuing signed out");
        }
    }

    /// Clear the current user, superseding any write still in flight.
    pub fn clear(&self) {
        let ticket = self.ticket();
        self.commit(ticket, None);
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.state.borrow().user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Wait until the state has left `Loading`.
    pub async fn ready(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            // Unreachable while `self` holds the sender.
            Err(_) => self.current(),
        };
        state
    }

    /// Stop accepting writes.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, UserSource};

    fn user(name: &str) -> CurrentUser {
        CurrentUser {
            id: "u-1".to_string(),
            email: "ana@example.com".to_string(),
            name: name.to_string(),
            phone: None,
            role: Role::User,
            created_at: String::new(),
            source: UserSource::Profile,
        }
    }

    #[test]
    fn test_starts_loading() {
        let store = SessionStore::new();
        assert!(store.is_loading());
        assert_eq!(store.user(), None);
    }

    #[test]
    fn test_newer_ticket_wins_over_late_older_commit() {
        let store = SessionStore::new();
        let bootstrap = store.ticket();
        let sign_in = store.ticket();

        assert!(store.commit(sign_in, Some(user("Ana"))));
        assert!(!store.commit(bootstrap, None));
        assert_eq!(store.user().map(|u| u.name), Some("Ana".to_string()));
    }

    #[test]
    fn test_in_order_commits_both_apply() {
        let store = SessionStore::new();
        let first = store.ticket();
        let second = store.ticket();

        assert!(store.commit(first, Some(user("Ana"))));
        assert!(store.commit(second, Some(user("Ana Silva"))));
        assert_eq!(store.user().map(|u| u.name), Some("Ana Silva".to_string()));
    }

    #[test]
    fn test_clear_supersedes_in_flight_hydration() {
        let store = SessionStore::new();
        let hydration = store.ticket();
        store.clear();

        assert!(!store.commit(hydration, Some(user("Ana"))));
        assert_eq!(store.current(), AuthState::SignedOut);
    }

    #[test]
    fn test_finish_loading_keeps_resolved_state() {
        let store = SessionStore::new();
        let ticket = store.ticket();
        store.commit(ticket, Some(user("Ana")));
        store.finish_loading();
        assert!(store.user().is_some());

        let fresh = SessionStore::new();
        fresh.finish_loading();
        assert_eq!(fresh.current(), AuthState::SignedOut);
    }

    #[test]
    fn test_no_writes_after_unmount() {
        let store = SessionStore::new();
        store.unmount();
        let ticket = store.ticket();
        assert!(!store.commit(ticket, Some(user("Ana"))));
        store.finish_loading();
        assert!(store.is_loading());
    }

    #[tokio::test]
    async fn test_ready_waits_for_resolution() {
        let store = std::sync::Arc::new(SessionStore::new());
        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let ticket = writer.ticket();
            writer.commit(ticket, Some(user("Ana")));
        });

        let state = store.ready().await;
        assert_eq!(state.user().map(|u| u.name.as_str()), Some("Ana"));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(AuthState::SignedOut).unwrap();
        assert_eq!(json["status"], "signed_out");

        let json = serde_json::to_value(AuthState::SignedIn(user("Ana"))).unwrap();
        assert_eq!(json["status"], "signed_in");
        assert_eq!(json["user"]["name"], "Ana");
    }
}
