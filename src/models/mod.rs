// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod chapter;
pub mod progress;
pub mod user;

pub use chapter::{Chapter, ChapterDraft};
pub use progress::Progress;
pub use user::{CurrentUser, Identity, NewProfile, Profile, Role, Session, UserSource};
