// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course-Portal API Server
//!
//! Hosts the sign-in and session lifecycle for the video course and serves
//! the chapter catalog and admin tools on top of the hosted backend.

use course_portal::{backend::SupabaseFactory, config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle browser sessions are swept.
const PRUNE_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, site_url = %config.site_url, "Starting Course-Portal API");

    let factory = SupabaseFactory::new(&config)?;
    tracing::info!(supabase_url = %config.supabase_url, "Backend client initialized");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), Arc::new(factory)));

    // Drop sessions of browsers that went away
    let pruner_state = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let pruned = pruner_state.sessions.prune_idle(
                pruner_state.config.session_idle_ttl,
                pruner_state.config.anonymous_session_ttl,
            );
            if pruned > 0 {
                tracing::info!(
                    pruned,
                    remaining = pruner_state.sessions.len(),
                    "Pruned idle browser sessions"
                );
            }
        }
    });

    // Build router
    let app = course_portal::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("course_portal=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .try_init()?;
    Ok(())
}
