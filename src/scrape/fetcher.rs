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

//! Content page fetching
//!
//! Both source sites swap real content for a decoy page when a request
//! arrives without a browser User-Agent or without a Referer pointing at the
//! site itself, so every GET carries both.

use crate::config::ScraperConfig;
use crate::error::{EngineError, Result};
use crate::scrape::rate_limiter::RateLimiter;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Build the HTTP client shared by the fetcher and the download workers
pub fn build_http_client(config: &ScraperConfig) -> Result<Client> {
    let client = Client::builder()
        .cookie_store(true)
        .gzip(true)
        .connect_timeout(Duration::from_secs(15))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Rate-limited page GET
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    user_agent: String,
    timeout: Duration,
    referer_override: Option<String>,
}

impl PageFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, config: &ScraperConfig) -> Self {
        Self {
            client,
            limiter,
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            referer_override: config.referer_override.clone(),
        }
    }

    /// Fetch page HTML. Waits on the shared limiter first.
    pub async fn fetch(&self, page_url: &str) -> Result<String> {
        let url = Url::parse(page_url)?;
        if url.host_str().is_none() {
            return Err(EngineError::InvalidUrl(format!("No host in {}", page_url)));
        }

        let referer = match &self.referer_override {
            Some(referer) => referer.clone(),
            None => origin_of(&url),
        };

        self.limiter.acquire().await;

        tracing::debug!(url = %url, referer = %referer, "fetching page");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, referer)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "fa-IR,fa;q=0.9,en-US;q=0.8,en;q=0.7")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(body)
    }
}

/// `scheme://host[:port]/`
pub fn origin_of(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}
