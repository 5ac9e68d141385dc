// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chapter catalog for learners and chapter management for admins.

use super::progress::{self, ProgressSummary};
use crate::backend::{buckets, DataApi, ServiceError, StorageApi};
use crate::error::{AppError, Result};
use crate::forms::FormError;
use crate::models::{Chapter, ChapterDraft};
use serde::Serialize;
use validator::Validate;

pub const EMPTY_CATALOG_MESSAGE: &str = "Nenhum capítulo disponível";

/// A chapter as shown on the learner dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterCard {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub watched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Catalog {
    Empty {
        message: String,
    },
    Chapters {
        chapters: Vec<ChapterCard>,
        progress: ProgressSummary,
    },
}

/// Published chapters with the learner's progress.
///
/// A failed chapter load shows the empty catalog rather than an error.
pub async fn learner_catalog<D: DataApi + ?Sized>(data: &D, user_id: &str) -> Catalog {
    let (chapters, watched) = futures_util::join!(
        data.list_chapters(true),
        progress::watched_ids(data, user_id)
    );

    let chapters = match chapters {
        Ok(chapters) => chapters,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to load chapters");
            Vec::new()
        }
    };

    if chapters.is_empty() {
        return Catalog::Empty {
            message: EMPTY_CATALOG_MESSAGE.to_string(),
        };
    }

    let progress = ProgressSummary::of(&chapters, &watched);
    let chapters = chapters
        .into_iter()
        .map(|chapter| ChapterCard {
            watched: watched.contains(&chapter.id),
            chapter,
        })
        .collect();

    Catalog::Chapters { chapters, progress }
}

/// A published chapter by id.
pub async fn published_chapter<D: DataApi + ?Sized>(data: &D, id: &str) -> Result<Chapter> {
    data.get_chapter(id)
        .await?
        .filter(|c| c.is_published)
        .ok_or_else(|| AppError::NotFound(format!("Chapter {}", id)))
}

/// Every chapter, published or not, by order.
pub async fn list_all<D: DataApi + ?Sized>(data: &D) -> Result<Vec<Chapter>> {
    Ok(data.list_chapters(false).await?)
}

fn validated(draft: ChapterDraft) -> Result<ChapterDraft> {
    let draft = draft.normalized();
    draft.validate().map_err(|e| {
        FormError::from_validation(&e, &["title", "description", "thumbnail_url", "order"])
    })?;
    Ok(draft)
}

/// Create a chapter; without an explicit order it goes last.
pub async fn create<D: DataApi + ?Sized>(data: &D, draft: ChapterDraft) -> Result<Chapter> {
    let mut draft = validated(draft)?;
    if draft.order.is_none() {
        let count = data.list_chapters(false).await?.len() as i32;
        draft.order = Some(count + 1);
    }

    let chapter = data.insert_chapter(&draft).await?;
    tracing::info!(chapter_id = %chapter.id, order = chapter.order, "Chapter created");
    Ok(chapter)
}

pub async fn update<D: DataApi + ?Sized>(data: &D, id: &str, draft: ChapterDraft) -> Result<Chapter> {
    let draft = validated(draft)?;
    match data.update_chapter(id, &draft).await {
        Ok(chapter) => {
            tracing::info!(chapter_id = %id, "Chapter updated");
            Ok(chapter)
        }
        Err(ServiceError::NotFound) => Err(AppError::NotFound(format!("Chapter {}", id))),
        Err(e) => Err(e.into()),
    }
}

/// Delete a chapter and, best effort, its video object.
pub async fn delete<B: DataApi + StorageApi + ?Sized>(backend: &B, id: &str) -> Result<()> {
    let chapter = backend
        .get_chapter(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chapter {}", id)))?;

    backend.delete_chapter(id).await?;
    tracing::info!(chapter_id = %id, "Chapter deleted");

    if let Some(path) = chapter.video_file_path {
        if let Err(e) = backend.remove(buckets::VIDEOS, &[path.clone()]).await {
            tracing::warn!(chapter_id = %id, path = %path, error = %e, "Failed to remove chapter video");
        }
    }
    Ok(())
}
