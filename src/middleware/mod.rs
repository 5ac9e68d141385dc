// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (browser sessions, role gating, security headers).

pub mod security;
pub mod session;

pub use session::{attach_session, require_admin, require_user};
