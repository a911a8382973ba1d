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

//! FarsiFlix core: source resolution and download engine
//!
//! - [`scrape`] turns a movie/episode page into ranked, CDN-normalized video
//!   URLs.
//! - [`download`] queues, persists and runs resumable transfers.
//! - [`engine::Engine`] wires both behind one HTTP client and one rate
//!   limiter.

pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod file;
pub mod logging;
pub mod retry;
pub mod scrape;
pub mod storage;

pub use config::EngineConfig;
pub use download::{DownloadItem, DownloadManager, DownloadRequest, DownloadStatus};
pub use engine::{Engine, ReplayResult};
pub use error::{EngineError, Result};
pub use retry::RetryRequest;
pub use scrape::{ScraperOutcome, VideoUrl, VideoUrlScraper};
