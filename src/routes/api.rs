// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for signed-in learners.

use crate::error::Result;
use crate::models::CurrentUser;
use crate::services::{chapters, media, progress, Catalog, VideoUrl};
use crate::session::BrowserSession;
use crate::AppState;
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Learner routes. `require_user` is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chapters", get(get_catalog))
        .route("/api/chapters/{id}/play", post(play_chapter))
        .route("/api/chapters/{id}/video", get(get_video))
}

/// Published chapters with the caller's progress.
async fn get_catalog(
    Extension(session): Extension<Arc<BrowserSession>>,
    Extension(user): Extension<CurrentUser>,
) -> Json<Catalog> {
    let backend = session.context().backend();
    Json(chapters::learner_catalog(backend.as_ref(), &user.id).await)
}

#[derive(Serialize)]
pub struct PlayResponse {
    pub chapter_id: String,
    /// False when progress could not be saved; playback goes ahead anyway
    pub recorded: bool,
}

/// Mark a chapter watched when playback starts.
async fn play_chapter(
    Extension(session): Extension<Arc<BrowserSession>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<PlayResponse>> {
    let backend = session.context().backend();
    let chapter = chapters::published_chapter(backend.as_ref(), &id).await?;
    let recorded = progress::record_play(backend.as_ref(), &user, &chapter.id).await;

    Ok(Json(PlayResponse {
        chapter_id: chapter.id,
        recorded,
    }))
}

/// Playback URL for a published chapter.
async fn get_video(
    Extension(session): Extension<Arc<BrowserSession>>,
    Path(id): Path<String>,
) -> Result<Json<VideoUrl>> {
    let backend = session.context().backend();
    let chapter = chapters::published_chapter(backend.as_ref(), &id).await?;
    Ok(Json(media::video_url(backend.as_ref(), &chapter).await?))
}
