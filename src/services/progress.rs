// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Learner progress: completion summaries, play tracking and the admin
//! report.

use crate::backend::DataApi;
use crate::error::Result;
use crate::models::{Chapter, CurrentUser, Progress};
use crate::time_utils::now_rfc3339;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressSummary {
    pub watched: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent
    pub percentage: u32,
}

impl ProgressSummary {
    /// Count only watched chapters that are still published.
    pub fn of(published: &[Chapter], watched: &HashSet<String>) -> Self {
        let total = published.len();
        let watched = published
            .iter()
            .filter(|c| watched.contains(&c.id))
            .count();
        let percentage = if total == 0 {
            0
        } else {
            ((watched as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            watched,
            total,
            percentage,
        }
    }
}

/// Watched chapter ids for a user. Errors degrade to an empty set.
pub async fn watched_ids<D: DataApi + ?Sized>(data: &D, user_id: &str) -> HashSet<String> {
    match data.watched_chapter_ids(user_id).await {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to load progress");
            HashSet::new()
        }
    }
}

/// Mark a chapter watched. Failure is logged and never blocks playback.
pub async fn record_play<D: DataApi + ?Sized>(data: &D, user: &CurrentUser, chapter_id: &str) -> bool {
    let progress = Progress::watched_now(&user.id, chapter_id, &now_rfc3339());
    match data.upsert_progress(&progress).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(user_id = %user.id, chapter_id, error = %e, "Failed to record progress");
            false
        }
    }
}

/// One learner's line in the admin report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerProgress {
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub summary: ProgressSummary,
}

/// Progress of every profile against the published chapters.
pub async fn learner_report<D: DataApi + ?Sized>(data: &D) -> Result<Vec<LearnerProgress>> {
    let (profiles, chapters, rows) = futures_util::try_join!(
        data.list_profiles(),
        data.list_chapters(true),
        data.list_watched_progress()
    )?;

    let mut watched_by_user: HashMap<String, HashSet<String>> = HashMap::new();
    for row in rows.into_iter().filter(|r| r.watched) {
        watched_by_user
            .entry(row.user_id)
            .or_default()
            .insert(row.chapter_id);
    }

    let empty = HashSet::new();
    Ok(profiles
        .into_iter()
        .map(|profile| {
            let watched = watched_by_user.get(&profile.id).unwrap_or(&empty);
            LearnerProgress {
                summary: ProgressSummary::of(&chapters, watched),
                user_id: profile.id,
                name: profile.name,
                email: profile.email,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str) -> Chapter {
        Chapter {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            video_file_path: None,
            thumbnail_url: None,
            duration: None,
            order: 1,
            is_published: true,
            created_at: String::new(),
        }
    }

    fn ids(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_summary_without_chapters() {
        let summary = ProgressSummary::of(&[], &ids(&["a"]));
        assert_eq!(summary.percentage, 0);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn test_summary_rounds() {
        let chapters = vec![chapter("a"), chapter("b"), chapter("c")];
        let summary = ProgressSummary::of(&chapters, &ids(&["a"]));
        assert_eq!(summary.watched, 1);
        assert_eq!(summary.percentage, 33);

        let summary = ProgressSummary::of(&chapters, &ids(&["a", "b"]));
        assert_eq!(summary.percentage, 67);
    }

    #[test]
    fn test_unpublished_watched_not_counted() {
        let chapters = vec![chapter("a")];
        let summary = ProgressSummary::of(&chapters, &ids(&["a", "gone"]));
        assert_eq!(summary.watched, 1);
        assert_eq!(summary.percentage, 100);
    }
}
