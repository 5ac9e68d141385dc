// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth session lifecycle for one browser: bootstrap, profile hydration,
//! event listening and sign-out, plus the registry of live browsers.

pub mod bootstrap;
pub mod context;
pub mod hydrator;
pub mod listener;
pub mod registry;
pub mod signout;
pub mod store;

pub use context::{AuthContext, ContextSettings, SignUpOutcome};
pub use registry::{BrowserSession, SessionRegistry};
pub use signout::Navigation;
pub use store::{AuthState, SessionStore};
