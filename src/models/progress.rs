// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-user chapter progress.

use serde::{Deserialize, Serialize};

/// Row in the `user_progress` table, one per (user, chapter) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub user_id: String,
    pub chapter_id: String,
    #[serde(default)]
    pub watched: bool,
    /// Seconds watched; left out of play upserts so a stored value survives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_time: Option<u32>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl Progress {
    /// Progress record for a chapter the user has just played.
    pub fn watched_now(user_id: &str, chapter_id: &str, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            chapter_id: chapter_id.to_string(),
            watched: true,
            watch_time: None,
            completed_at: Some(now.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_record_omits_watch_time() {
        let progress = Progress::watched_now("u-1", "c-1", "2026-01-01T00:00:00Z");
        let json = serde_json::to_value(&progress).unwrap();
        assert!(json.get("watch_time").is_none());
        assert_eq!(json["watched"], true);
    }

    #[test]
    fn test_stored_row_reads_watch_time() {
        let row: Progress = serde_json::from_str(
            r#"{"user_id":"u-1","chapter_id":"c-1","watched":true,"watch_time":42}"#,
        )
        .unwrap();
        assert_eq!(row.watch_time, Some(42));
    }
}
