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

//! Engine facade
//!
//! One HTTP client and one rate limiter are built here and handed to both
//! the scraper and the download workers; nothing is global.
//!
//! # Example
//! ```rust,no_run
//! use farsiflix_core::config::EngineConfig;
//! use farsiflix_core::download::{DownloadRequest, MemoryDownloadStore};
//! use farsiflix_core::engine::Engine;
//! use std::sync::Arc;
//!
//! # async fn example() -> farsiflix_core::error::Result<()> {
//! let engine = Engine::new(EngineConfig::default(), Arc::new(MemoryDownloadStore::new())).await?;
//!
//! let request = DownloadRequest::Movie { movie_id: 7, title: "Film".into(), poster_url: None };
//! engine.download_best("https://namakade.com/movies/film", &request).await?;
//!
//! let mut progress = engine.download_progress();
//! while progress.changed().await.is_ok() {
//!     println!("{:?}", progress.borrow().get("movie_7"));
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::download::manager::DownloadManager;
use crate::download::models::{DownloadItem, DownloadRequest};
use crate::download::progress::DownloadProgress;
use crate::download::store::DownloadStore;
use crate::error::{EngineError, Result};
use crate::retry::RetryRequest;
use crate::scrape::fetcher::build_http_client;
use crate::scrape::models::ScraperOutcome;
use crate::scrape::rate_limiter::RateLimiter;
use crate::scrape::scraper::VideoUrlScraper;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// What [`Engine::replay`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayResult {
    Resolved(ScraperOutcome),
    Queued(bool),
    Retried,
}

pub struct Engine {
    config: EngineConfig,
    scraper: VideoUrlScraper,
    downloads: DownloadManager,
}

impl Engine {
    /// Build the engine and re-attach any downloads left by a previous run
    pub async fn new(config: EngineConfig, store: Arc<dyn DownloadStore>) -> Result<Self> {
        let client = build_http_client(&config.scraper)?;
        let limiter = Arc::new(RateLimiter::new(config.scraper.min_request_interval()));
        Self::with_parts(config, store, client, limiter).await
    }

    /// Build with a caller-supplied client and limiter (shared across
    /// engines, or pointed at a test server)
    pub async fn with_parts(
        config: EngineConfig,
        store: Arc<dyn DownloadStore>,
        client: Client,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        config.validate()?;

        let scraper = VideoUrlScraper::new(
            client.clone(),
            limiter,
            &config.scraper,
            config.cdn.clone(),
        );
        let downloads = DownloadManager::new(store, client, config.download.clone());
        downloads.restore().await?;

        tracing::info!(
            directory = %config.download.download_directory.display(),
            workers = config.download.max_concurrent_downloads,
            "engine ready"
        );

        Ok(Self {
            config,
            scraper,
            downloads,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    pub async fn resolve(&self, page_url: &str) -> ScraperOutcome {
        self.scraper.resolve(page_url).await
    }

    pub async fn clear_cache(&self) {
        self.scraper.clear_cache().await;
    }

    /// Resolve `page_url` and queue its highest-ranked URL
    pub async fn download_best(&self, page_url: &str, request: &DownloadRequest) -> Result<bool> {
        match self.resolve(page_url).await {
            ScraperOutcome::Success { urls } => {
                let best = urls.first().ok_or_else(|| {
                    EngineError::NoDataFound(format!("No playable video found on {}", page_url))
                })?;
                if best.low_confidence {
                    tracing::warn!(page = %page_url, url = %best.url, "queueing low-confidence URL");
                }
                self.downloads.queue(request, &best.url).await
            }
            ScraperOutcome::NetworkError { message } => Err(EngineError::network_error(message, true)),
            ScraperOutcome::ParseError { message } => Err(EngineError::ParseError(message)),
            ScraperOutcome::NoDataFound { message } => Err(EngineError::NoDataFound(message)),
        }
    }

    pub async fn replay(&self, retry: &RetryRequest) -> Result<ReplayResult> {
        tracing::info!(op = %retry.describe(), "replaying request");
        match retry {
            RetryRequest::Resolve { page_url } => Ok(ReplayResult::Resolved(self.resolve(page_url).await)),
            RetryRequest::Queue { request, video_url } => {
                Ok(ReplayResult::Queued(self.downloads.queue(request, video_url).await?))
            }
            RetryRequest::DownloadBest { page_url, request } => {
                Ok(ReplayResult::Queued(self.download_best(page_url, request).await?))
            }
            RetryRequest::RetryDownload { id } => {
                self.downloads.retry_download(id).await?;
                Ok(ReplayResult::Retried)
            }
        }
    }

    pub async fn queue_movie_download(
        &self,
        movie_id: i64,
        title: &str,
        poster_url: Option<&str>,
        video_url: &str,
    ) -> Result<bool> {
        self.downloads
            .queue_movie_download(movie_id, title, poster_url, video_url)
            .await
    }

    pub async fn queue_episode_download(
        &self,
        episode_id: i64,
        series_title: &str,
        episode_info: &str,
        poster_url: Option<&str>,
        video_url: &str,
    ) -> Result<bool> {
        self.downloads
            .queue_episode_download(episode_id, series_title, episode_info, poster_url, video_url)
            .await
    }

    pub async fn pause_download(&self, id: &str) -> Result<()> {
        self.downloads.pause_download(id).await
    }

    pub async fn resume_download(&self, id: &str) -> Result<()> {
        self.downloads.resume_download(id).await
    }

    pub async fn cancel_download(&self, id: &str) -> Result<()> {
        self.downloads.cancel_download(id).await
    }

    pub async fn delete_download(&self, id: &str) -> Result<()> {
        self.downloads.delete_download(id).await
    }

    pub async fn retry_download(&self, id: &str) -> Result<()> {
        self.downloads.retry_download(id).await
    }

    pub fn all_downloads(&self) -> watch::Receiver<Vec<DownloadItem>> {
        self.downloads.all_downloads()
    }

    pub fn download_progress(&self) -> watch::Receiver<HashMap<String, u8>> {
        self.downloads.download_progress()
    }

    pub async fn progress_snapshot(&self, id: &str) -> Option<DownloadProgress> {
        self.downloads.progress_snapshot(id).await
    }

    pub async fn is_downloaded(&self, id: &str) -> Result<bool> {
        self.downloads.is_downloaded(id).await
    }

    pub async fn get_download(&self, id: &str) -> Result<Option<DownloadItem>> {
        self.downloads.get_download(id).await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scraper", &self.scraper)
            .field("downloads", &self.downloads)
            .finish()
    }
}
