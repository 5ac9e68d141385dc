// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Course-Portal: sign-in, session lifecycle and chapter catalog for a
//! video course
//!
//! This crate provides the backend API that keeps each browser's auth
//! session in sync with the hosted auth service and gates the learner and
//! admin areas on the resolved user.

pub mod backend;
pub mod config;
pub mod crypto;
pub mod error;
pub mod flows;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod time_utils;

use backend::BackendFactory;
use config::Config;
use session::{ContextSettings, SessionRegistry};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config, factory: Arc<dyn BackendFactory>) -> Self {
        let settings = ContextSettings {
            site_url: config.site_url.clone(),
            bootstrap_timeout: config.bootstrap_timeout,
        };
        Self {
            sessions: SessionRegistry::new(factory, settings),
            config,
        }
    }
}
