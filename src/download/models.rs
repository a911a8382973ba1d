// FarsiFlix - Persian Streaming Engine
// Copyright (C) 2025 FarsiFlix contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Download records
//!
//! # State machine
//! ```text
//! PENDING ──worker──▶ DOWNLOADING ──done──▶ COMPLETED
//!    │                  │    ▲
//!    │             pause│    │resume
//!    │                  ▼    │
//!    ├────pause──────▶ PAUSED
//!    │
//!    └─ PENDING | DOWNLOADING | PAUSED ──cancel──▶ CANCELLED
//!       DOWNLOADING ──unrecoverable──▶ FAILED ──re-queue──▶ PENDING
//! ```

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "PENDING",
            DownloadStatus::Downloading => "DOWNLOADING",
            DownloadStatus::Paused => "PAUSED",
            DownloadStatus::Completed => "COMPLETED",
            DownloadStatus::Failed => "FAILED",
            DownloadStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(DownloadStatus::Pending),
            "DOWNLOADING" => Ok(DownloadStatus::Downloading),
            "PAUSED" => Ok(DownloadStatus::Paused),
            "COMPLETED" => Ok(DownloadStatus::Completed),
            "FAILED" => Ok(DownloadStatus::Failed),
            "CANCELLED" => Ok(DownloadStatus::Cancelled),
            _ => Err(EngineError::InvalidInput(format!("Invalid download status: {}", s))),
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Movie,
    Episode,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "MOVIE",
            ContentType::Episode => "EPISODE",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "MOVIE" => Ok(ContentType::Movie),
            "EPISODE" => Ok(ContentType::Episode),
            _ => Err(EngineError::InvalidInput(format!("Invalid content type: {}", s))),
        }
    }

    /// Stable record id, e.g. `movie_42`
    pub fn derive_id(&self, numeric_id: i64) -> String {
        match self {
            ContentType::Movie => format!("movie_{}", numeric_id),
            ContentType::Episode => format!("episode_{}", numeric_id),
        }
    }
}

/// Durable download record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    /// `movie_<id>` / `episode_<id>`
    pub id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub content_type: ContentType,
    pub video_url: String,
    /// Destination path on disk
    pub file_path: String,
    /// Total size in bytes; 0 until the server reports it
    pub file_size: i64,
    /// 0..=100, 100 only when COMPLETED
    pub progress: u8,
    pub status: DownloadStatus,
    /// Last failure, shown next to the retry action
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DownloadItem {
    pub fn new(
        id: String,
        title: String,
        poster_url: Option<String>,
        content_type: ContentType,
        video_url: String,
        file_path: String,
    ) -> Self {
        Self {
            id,
            title,
            poster_url,
            content_type,
            video_url,
            file_path,
            file_size: 0,
            progress: 0,
            status: DownloadStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == DownloadStatus::Completed
    }
}

/// What to download, independent of the URL it will come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadRequest {
    Movie {
        movie_id: i64,
        title: String,
        poster_url: Option<String>,
    },
    Episode {
        episode_id: i64,
        series_title: String,
        episode_info: String,
        poster_url: Option<String>,
    },
}

impl DownloadRequest {
    pub fn id(&self) -> String {
        match self {
            DownloadRequest::Movie { movie_id, .. } => ContentType::Movie.derive_id(*movie_id),
            DownloadRequest::Episode { episode_id, .. } => ContentType::Episode.derive_id(*episode_id),
        }
    }

    /// Title as shown in the download list
    pub fn display_title(&self) -> String {
        match self {
            DownloadRequest::Movie { title, .. } => title.clone(),
            DownloadRequest::Episode {
                series_title,
                episode_info,
                ..
            } => format!("{} - {}", series_title, episode_info),
        }
    }
}

/// Percentage of `written` out of `total`, held at 99 until the manager
/// marks the record COMPLETED
pub fn progress_percent(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (written.min(total) as f64 / total as f64 * 100.0) as u8;
    percent.min(99)
}
