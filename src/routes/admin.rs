// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: chapter management, uploads and the progress report.

use crate::error::{AppError, Result};
use crate::models::{Chapter, ChapterDraft, CurrentUser};
use crate::services::media::{self, MAX_THUMBNAIL_BYTES, MAX_VIDEO_BYTES};
use crate::services::{chapters, progress, LearnerProgress, StoredThumbnail, StoredVideo, Upload};
use crate::session::BrowserSession;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Room for the request framing on top of the file itself.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Admin routes. `require_admin` is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/chapters", get(list_chapters).post(create_chapter))
        .route(
            "/api/admin/chapters/{id}",
            put(update_chapter).delete(delete_chapter),
        )
        .route(
            "/api/admin/uploads/video",
            post(upload_video).layer(DefaultBodyLimit::max(MAX_VIDEO_BYTES + BODY_LIMIT_SLACK)),
        )
        .route(
            "/api/admin/uploads/thumbnail",
            post(upload_thumbnail)
                .layer(DefaultBodyLimit::max(MAX_THUMBNAIL_BYTES + BODY_LIMIT_SLACK)),
        )
        .route("/api/admin/progress", get(get_progress))
}

// ─── Chapters ────────────────────────────────────────────────

async fn list_chapters(
    Extension(session): Extension<Arc<BrowserSession>>,
) -> Result<Json<Vec<Chapter>>> {
    let backend = session.context().backend();
    Ok(Json(chapters::list_all(backend.as_ref()).await?))
}

async fn create_chapter(
    Extension(session): Extension<Arc<BrowserSession>>,
    Extension(admin): Extension<CurrentUser>,
    Json(draft): Json<ChapterDraft>,
) -> Result<(StatusCode, Json<Chapter>)> {
    let backend = session.context().backend();
    let chapter = chapters::create(backend.as_ref(), draft).await?;
    tracing::info!(admin_id = %admin.id, chapter_id = %chapter.id, "Admin created chapter");
    Ok((StatusCode::CREATED, Json(chapter)))
}

async fn update_chapter(
    Extension(session): Extension<Arc<BrowserSession>>,
    Path(id): Path<String>,
    Json(draft): Json<ChapterDraft>,
) -> Result<Json<Chapter>> {
    let backend = session.context().backend();
    Ok(Json(chapters::update(backend.as_ref(), &id, draft).await?))
}

async fn delete_chapter(
    Extension(session): Extension<Arc<BrowserSession>>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let backend = session.context().backend();
    chapters::delete(backend.as_ref(), &id).await?;
    tracing::info!(admin_id = %admin.id, chapter_id = %id, "Admin deleted chapter");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Uploads ─────────────────────────────────────────────────

/// Uploads send the raw file as the body; the name travels in the query.
#[derive(Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub file_name: String,
}

fn upload_from(params: UploadParams, headers: &HeaderMap, body: Bytes) -> Result<Upload> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .ok_or_else(|| AppError::BadRequest("Content-Type em falta".to_string()))?;

    if body.is_empty() {
        return Err(AppError::BadRequest("Ficheiro vazio".to_string()));
    }

    Ok(Upload {
        file_name: params.file_name,
        content_type,
        bytes: body.to_vec(),
    })
}

async fn upload_video(
    Extension(session): Extension<Arc<BrowserSession>>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredVideo>)> {
    let upload = upload_from(params, &headers, body)?;
    let backend = session.context().backend();
    let stored = media::upload_video(backend.as_ref(), upload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn upload_thumbnail(
    Extension(session): Extension<Arc<BrowserSession>>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredThumbnail>)> {
    let upload = upload_from(params, &headers, body)?;
    let backend = session.context().backend();
    let stored = media::upload_thumbnail(backend.as_ref(), upload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

// ─── Progress ────────────────────────────────────────────────

async fn get_progress(
    Extension(session): Extension<Arc<BrowserSession>>,
) -> Result<Json<Vec<LearnerProgress>>> {
    let backend = session.context().backend();
    Ok(Json(progress::learner_report(backend.as_ref()).await?))
}
