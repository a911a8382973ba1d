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

//! Content page → ranked video URLs
//!
//! # Example
//!
//! ```rust,no_run
//! use farsiflix_core::config::ScraperConfig;
//! use farsiflix_core::scrape::{build_http_client, RateLimiter, VideoUrlScraper};
//! use std::sync::Arc;
//!
//! # async fn example() -> farsiflix_core::error::Result<()> {
//! let config = ScraperConfig::default();
//! let client = build_http_client(&config)?;
//! let limiter = Arc::new(RateLimiter::new(config.min_request_interval()));
//! let scraper = VideoUrlScraper::new(client, limiter, &config, Default::default());
//!
//! let outcome = scraper.resolve("https://namakade.com/series/khaneh/episode-1").await;
//! if let Some(best) = outcome.best() {
//!     println!("{} {}", best.quality, best.url);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{CdnConfig, ScraperConfig};
use crate::error::EngineError;
use crate::scrape::cache::ResultCache;
use crate::scrape::cdn::CdnNormalizer;
use crate::scrape::extract::Extractor;
use crate::scrape::fetcher::PageFetcher;
use crate::scrape::models::{ScraperOutcome, VideoUrl};
use crate::scrape::rank::rank;
use crate::scrape::rate_limiter::RateLimiter;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

pub struct VideoUrlScraper {
    fetcher: PageFetcher,
    cdn: CdnNormalizer,
    cache: ResultCache,
    extractor: Extractor,
}

impl VideoUrlScraper {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        config: &ScraperConfig,
        cdn: CdnConfig,
    ) -> Self {
        Self {
            fetcher: PageFetcher::new(client, limiter, config),
            cdn: CdnNormalizer::new(&cdn),
            cache: ResultCache::new(config.cache_capacity, config.cache_ttl()),
            extractor: Extractor::new(config.script_variables.clone()),
        }
    }

    /// Resolve a content page. Never fails; every problem is classified into
    /// an outcome variant. No retries happen here.
    pub async fn resolve(&self, page_url: &str) -> ScraperOutcome {
        let key = self.cdn.cache_key(page_url);

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(page = %page_url, "outcome served from cache");
            return cached;
        }

        tracing::debug!(page = %page_url, "cache miss");

        let outcome = match self.fetcher.fetch(page_url).await {
            Ok(html) => self.classify(page_url, &html),
            Err(e) => {
                tracing::warn!(page = %page_url, error = %e, "page fetch failed");
                ScraperOutcome::from(e)
            }
        };

        // Retryable failures stay out of the cache so a retry refetches
        if !outcome.is_retryable() {
            self.cache.insert(key, outcome.clone()).await;
        }

        outcome
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn classify(&self, page_url: &str, html: &str) -> ScraperOutcome {
        let page = match Url::parse(page_url) {
            Ok(page) => page,
            Err(e) => return EngineError::from(e).into(),
        };

        let extraction = self.extractor.extract(html, &page);

        let mut seen = HashSet::new();
        let mut urls: Vec<VideoUrl> = extraction
            .candidates
            .into_iter()
            .filter_map(|candidate| {
                let url = self.cdn.normalize(&candidate.url);
                if !seen.insert(self.cdn.cache_key(&url)) {
                    return None;
                }
                Some(VideoUrl {
                    quality: candidate.quality,
                    url,
                    low_confidence: candidate.method.is_low_confidence(),
                })
            })
            .collect();

        if urls.is_empty() {
            return match extraction.parse_error {
                Some(message) => ScraperOutcome::ParseError { message },
                None => {
                    tracing::info!(page = %page_url, "no video reference on page");
                    ScraperOutcome::NoDataFound {
                        message: format!("No playable video found on {}", page_url),
                    }
                }
            };
        }

        rank(&mut urls);
        tracing::info!(page = %page_url, count = urls.len(), best = %urls[0].url, "resolved");
        ScraperOutcome::Success { urls }
    }
}

impl std::fmt::Debug for VideoUrlScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoUrlScraper")
            .field("cdn", &self.cdn)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}
