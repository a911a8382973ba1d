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

//! Engine configuration
//!
//! All sections deserialize with `#[serde(default)]`, so a partial JSON file
//! only overrides the keys it names.
//!
//! ```json
//! {
//!   "scraper": { "min_request_interval_ms": 750 },
//!   "download": { "download_directory": "/sdcard/FarsiFlix", "max_concurrent_downloads": 3 }
//! }
//! ```

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Desktop browser UA; the sites serve a blocker page to obvious bots
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Page scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// User-Agent sent with every page request
    pub user_agent: String,

    /// Per-request timeout for page fetches
    pub request_timeout_secs: u64,

    /// Minimum spacing between two outbound page requests
    pub min_request_interval_ms: u64,

    /// Maximum number of cached outcomes
    pub cache_capacity: usize,

    /// Lifetime of a cached outcome
    pub cache_ttl_secs: u64,

    /// JavaScript variable names holding the episode/movie payload
    pub script_variables: Vec<String>,

    /// Fixed Referer; when unset the page's own origin is used
    pub referer_override: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 20,
            min_request_interval_ms: 500,
            cache_capacity: 256,
            cache_ttl_secs: 30 * 60,
            script_variables: vec!["seriesepisode_respose".to_string()],
            referer_override: None,
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Geo-blocked media host → reachable mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnConfig {
    pub host_rewrites: BTreeMap<String, String>,
}

impl Default for CdnConfig {
    fn default() -> Self {
        let mut host_rewrites = BTreeMap::new();
        host_rewrites.insert("iranproud2.net".to_string(), "negahestan.com".to_string());
        host_rewrites.insert("iranproud.net".to_string(), "negahestan.com".to_string());
        Self { host_rewrites }
    }
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory for downloaded files
    pub download_directory: PathBuf,

    /// Maximum concurrent downloads
    pub max_concurrent_downloads: usize,

    /// Retry attempts for a transient transfer failure
    pub max_retries: u32,

    /// First backoff delay; doubles on each further attempt
    pub retry_base_delay_ms: u64,

    /// Bytes written to disk per chunk (progress and cancellation granularity)
    pub chunk_size: usize,

    /// Stall detection: max wait for the next bytes from the server
    pub chunk_timeout_secs: u64,

    /// Timeout for the range request to start answering
    pub connect_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_directory: PathBuf::from("./downloads"),
            max_concurrent_downloads: 2,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            chunk_size: 256 * 1024,
            chunk_timeout_secs: 30,
            connect_timeout_secs: 30,
        }
    }
}

impl DownloadConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Backoff before retry `attempt` (1-based): base, 2×base, 4×base, ...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_base_delay() * 2u32.pow(attempt.saturating_sub(1).min(5))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scraper: ScraperConfig,
    pub cdn: CdnConfig,
    pub download: DownloadConfig,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Load from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigurationError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            EngineError::ConfigurationError(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(EngineError::ConfigurationError(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.download.chunk_size == 0 {
            return Err(EngineError::ConfigurationError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.scraper.cache_capacity == 0 {
            return Err(EngineError::ConfigurationError(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.download.download_directory = dir.into();
        self
    }

    pub fn max_concurrent_downloads(mut self, max: usize) -> Self {
        self.config.download.max_concurrent_downloads = max;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.download.max_retries = retries;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.download.retry_base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.download.chunk_size = bytes;
        self
    }

    pub fn min_request_interval(mut self, interval: Duration) -> Self {
        self.config.scraper.min_request_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.scraper.user_agent = user_agent.into();
        self
    }

    pub fn cdn_rewrite<S: Into<String>>(mut self, blocked: S, working: S) -> Self {
        self.config.cdn.host_rewrites.insert(blocked.into(), working.into());
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
