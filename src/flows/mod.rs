// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entry-point flows: route classification, password recovery and the
//! OAuth callback.

pub mod callback;
pub mod recovery;
pub mod route;

pub use callback::CallbackState;
pub use recovery::{RecoveryFlow, RecoveryState};
pub use route::{classify, CallbackParams, RecoveryParams, Route};
