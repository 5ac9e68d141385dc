// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Video and thumbnail storage.

use crate::backend::{buckets, StorageApi};
use crate::crypto;
use crate::error::{AppError, Result};
use crate::models::Chapter;
use serde::Serialize;

/// Lifetime of a signed video URL (2 hours).
pub const VIDEO_URL_TTL_SECS: u64 = 7200;
pub const MAX_VIDEO_BYTES: usize = 50 * 1024 * 1024;
pub const MAX_THUMBNAIL_BYTES: usize = 5 * 1024 * 1024;

pub const VIDEO_UNAVAILABLE: &str = "Vídeo não disponível";

const THUMBNAIL_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];
const UPLOAD_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoUrl {
    pub url: String,
    /// False when signing failed and the public URL is used instead
    pub signed: bool,
}

/// Playback URL for a chapter's video: signed, else public.
pub async fn video_url<S: StorageApi + ?Sized>(storage: &S, chapter: &Chapter) -> Result<VideoUrl> {
    let path = chapter
        .video_file_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::NotFound(VIDEO_UNAVAILABLE.to_string()))?;

    match storage
        .create_signed_url(buckets::VIDEOS, path, VIDEO_URL_TTL_SECS)
        .await
    {
        Ok(url) => Ok(VideoUrl { url, signed: true }),
        Err(e) => {
            tracing::warn!(chapter_id = %chapter.id, error = %e, "Signing video URL failed, using public URL");
            Ok(VideoUrl {
                url: storage.public_url(buckets::VIDEOS, path),
                signed: false,
            })
        }
    }
}

/// An uploaded file as received from the admin form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredVideo {
    /// Path inside the `videos` bucket, stored on the chapter
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredThumbnail {
    pub path: String,
    pub public_url: String,
}

pub async fn upload_video<S: StorageApi + ?Sized>(storage: &S, upload: Upload) -> Result<StoredVideo> {
    if upload.bytes.len() > MAX_VIDEO_BYTES {
        return Err(AppError::PayloadTooLarge(
            "O ficheiro deve ter no máximo 50MB".to_string(),
        ));
    }
    if !upload.content_type.starts_with("video/") {
        return Err(AppError::BadRequest("O ficheiro deve ser um vídeo".to_string()));
    }

    let path = format!("videos/{}", object_name(&upload.file_name, "mp4")?);
    let size = upload.bytes.len();
    let path = storage
        .upload(buckets::VIDEOS, &path, upload.bytes, &upload.content_type)
        .await?;

    tracing::info!(path = %path, size, "Video uploaded");
    Ok(StoredVideo { path })
}

pub async fn upload_thumbnail<S: StorageApi + ?Sized>(
    storage: &S,
    upload: Upload,
) -> Result<StoredThumbnail> {
    if upload.bytes.len() > MAX_THUMBNAIL_BYTES {
        return Err(AppError::PayloadTooLarge(
            "A imagem deve ter no máximo 5MB".to_string(),
        ));
    }
    if !THUMBNAIL_TYPES.contains(&upload.content_type.as_str()) {
        return Err(AppError::BadRequest(
            "A thumbnail deve ser uma imagem JPEG, PNG, WebP ou GIF".to_string(),
        ));
    }

    let path = format!("thumbs/{}", object_name(&upload.file_name, "jpg")?);
    let path = storage
        .upload(buckets::THUMBNAILS, &path, upload.bytes, &upload.content_type)
        .await?;
    let public_url = storage.public_url(buckets::THUMBNAILS, &path);

    tracing::info!(path = %path, "Thumbnail uploaded");
    Ok(StoredThumbnail { path, public_url })
}

/// `{millis}-{random}.{ext}`, keeping the original extension when sane.
fn object_name(file_name: &str, default_ext: &str) -> Result<String> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| default_ext.to_string());
    let suffix = crypto::random_suffix(UPLOAD_SUFFIX_LEN)?;
    Ok(format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        ext
    ))
}
