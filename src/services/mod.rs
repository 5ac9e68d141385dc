// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - course catalog, progress and media.

pub mod chapters;
pub mod media;
pub mod progress;

pub use chapters::{Catalog, ChapterCard};
pub use media::{StoredThumbnail, StoredVideo, Upload, VideoUrl};
pub use progress::{LearnerProgress, ProgressSummary};
