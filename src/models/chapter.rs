// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Course chapter model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Stored chapter row in the `chapters` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Object path inside the `videos` bucket
    #[serde(default)]
    pub video_file_path: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Free-form duration label (e.g. "15:30")
    #[serde(default)]
    pub duration: Option<String>,
    /// Position in the course, assigned by admins
    pub order: i32,
    pub is_published: bool,
    #[serde(default)]
    pub created_at: String,
}

/// Admin-editable chapter fields, used for both insert and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChapterDraft {
    #[validate(length(min = 1, max = 200, message = "O título é obrigatório"))]
    pub title: String,
    #[validate(length(min = 1, message = "A descrição é obrigatória"))]
    pub description: String,
    #[serde(default)]
    pub video_file_path: Option<String>,
    #[serde(default)]
    #[validate(url(message = "URL da thumbnail inválida"))]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    /// Defaults to the next free position when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "A ordem deve ser pelo menos 1"))]
    pub order: Option<i32>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

impl ChapterDraft {
    /// Treat blank optional inputs as absent.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.title = self.title.trim().to_string();
        self.video_file_path = blank_to_none(self.video_file_path);
        self.thumbnail_url = blank_to_none(self.thumbnail_url);
        self.duration = blank_to_none(self.duration);
        self
    }

    /// Apply this draft on top of an existing chapter.
    pub fn apply_to(&self, chapter: &Chapter) -> Chapter {
        Chapter {
            id: chapter.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            video_file_path: self.video_file_path.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            duration: self.duration.clone(),
            order: self.order.unwrap_or(chapter.order),
            is_published: self.is_published,
            created_at: chapter.created_at.clone(),
        }
    }
}
