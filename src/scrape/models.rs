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

//! Scraper value types

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// A playable video URL with its free-text quality label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoUrl {
    /// Resolution descriptor as found on the page ("1080p", "HD", "")
    pub quality: String,

    /// Normalized media URL
    pub url: String,

    /// Set when the URL came from the attribute fallback
    #[serde(default)]
    pub low_confidence: bool,
}

impl VideoUrl {
    pub fn new<Q: Into<String>, U: Into<String>>(quality: Q, url: U) -> Self {
        Self {
            quality: quality.into(),
            url: url.into(),
            low_confidence: false,
        }
    }
}

/// Which strategy produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    /// JSON payload assigned to a known `<script>` variable
    ScriptVariable,
    /// `<video><source src>` markup
    MediaTag,
    /// Player iframe carrying the file in a `source=` query parameter
    IframeEmbed,
    /// Custom data attribute on the player container
    AttributeFallback,
}

impl ExtractionMethod {
    pub fn is_low_confidence(&self) -> bool {
        matches!(self, ExtractionMethod::AttributeFallback)
    }
}

/// Result of resolving one content page
///
/// Exactly one variant is produced per `resolve` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScraperOutcome {
    /// Ranked list, best quality first
    Success { urls: Vec<VideoUrl> },
    /// Fetch failed (connectivity, timeout, non-2xx)
    NetworkError { message: String },
    /// Embedded structured data was malformed
    ParseError { message: String },
    /// Page carried no usable video reference
    NoDataFound { message: String },
}

impl ScraperOutcome {
    /// Whether the UI should offer a retry action
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperOutcome::NetworkError { .. } | ScraperOutcome::ParseError { .. } => true,
            ScraperOutcome::Success { .. } | ScraperOutcome::NoDataFound { .. } => false,
        }
    }

    /// Highest-ranked URL of a successful resolution
    pub fn best(&self) -> Option<&VideoUrl> {
        match self {
            ScraperOutcome::Success { urls } => urls.first(),
            ScraperOutcome::NetworkError { .. }
            | ScraperOutcome::ParseError { .. }
            | ScraperOutcome::NoDataFound { .. } => None,
        }
    }

    /// Error text for the failure variants
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ScraperOutcome::Success { .. } => None,
            ScraperOutcome::NetworkError { message }
            | ScraperOutcome::ParseError { message }
            | ScraperOutcome::NoDataFound { message } => Some(message),
        }
    }
}

impl From<EngineError> for ScraperOutcome {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::ParseError(_) | EngineError::SerdeJsonError(_) => {
                ScraperOutcome::ParseError { message }
            }
            EngineError::NoDataFound(_)
            | EngineError::InvalidUrl(_)
            | EngineError::InvalidInput(_)
            | EngineError::RecordNotFound(_) => ScraperOutcome::NoDataFound { message },
            EngineError::NetworkError { .. }
            | EngineError::HttpStatus { .. }
            | EngineError::Timeout(_)
            | EngineError::DownloadNetworkError(_)
            | EngineError::RangeNotSatisfiable { .. }
            | EngineError::FileSizeMismatch { .. }
            | EngineError::DownloadIoError(_)
            | EngineError::InvalidState(_)
            | EngineError::ConfigurationError(_)
            | EngineError::MigrationFailed(_)
            | EngineError::SqlxError(_) => ScraperOutcome::NetworkError { message },
        }
    }
}
