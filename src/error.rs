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

//! Error types for the FarsiFlix engine
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by the subsystem that raises them:
//!
//! ### Scraping
//! - Connectivity, DNS and timeouts → `NetworkError`, `Timeout`
//! - Non-2xx page responses → `HttpStatus`
//! - Script/JSON shape changed → `ParseError`
//! - Page parsed but no playable URL → `NoDataFound`
//!
//! ### Downloads
//! - Disk write/read failures → `DownloadIoError` (never retried)
//! - Transfer interrupted mid-stream → `DownloadNetworkError`
//! - Final size does not match the advertised length → `FileSizeMismatch`
//!
//! ### Records and state
//! - `RecordNotFound`, `InvalidState`, `InvalidInput`, `ConfigurationError`
//!
//! The scraper never surfaces these to callers directly; it folds them into a
//! [`ScraperOutcome`](crate::scrape::ScraperOutcome). The download manager
//! stores the `Display` form of the last error on the failed record.

use thiserror::Error;

/// Result type alias using our EngineError type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== Network Errors =====

    /// Network connectivity error (connect refused, DNS, reset)
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// URL could not be parsed or has no host
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // ===== Scraping Errors =====

    /// Embedded structured data was present but malformed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Page fetched and parsed but carried no usable video reference
    #[error("No video found: {0}")]
    NoDataFound(String),

    // ===== Download Errors =====

    /// Disk write/read failure while transferring
    #[error("Download I/O error: {0}")]
    DownloadIoError(String),

    /// Transfer interrupted
    #[error("Download interrupted: {0}")]
    DownloadNetworkError(String),

    /// Downloaded size differs from the advertised content length
    #[error("Download file size mismatch: expected {expected} bytes, got {actual} bytes")]
    FileSizeMismatch {
        expected: u64,
        actual: u64,
    },

    /// Server rejected the resume offset
    #[error("Range not satisfiable at offset {offset}")]
    RangeNotSatisfiable {
        offset: u64,
    },

    // ===== Record/State Errors =====

    /// Download record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Operation not valid for the record's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    // ===== External Library Errors =====

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return EngineError::NetworkError {
                message: format!("Request timed out: {}", err),
                is_transient: true,
            };
        }

        if let Some(status) = err.status() {
            return EngineError::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }

        let is_transient = err.is_connect() || err.is_body() || err.is_request();
        EngineError::NetworkError {
            message: err.to_string(),
            is_transient,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::DownloadIoError(err.to_string())
    }
}

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::InvalidUrl(err.to_string())
    }
}

// Helper methods for creating common errors
impl EngineError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        EngineError::RecordNotFound(resource.into())
    }

    /// Create an InvalidState error with a message
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        EngineError::InvalidState(message.into())
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        EngineError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Check if error is retryable (network errors, timeouts, etc.)
    ///
    /// Returns `true` for transient errors that might succeed on retry:
    /// - Network errors marked as transient
    /// - Timeouts
    /// - 5xx and 429 responses
    /// - Interrupted transfers (can resume from the written offset)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NetworkError { is_transient: true, .. }
                | EngineError::Timeout(_)
                | EngineError::HttpStatus { status: 429 | 500..=599, .. }
                | EngineError::DownloadNetworkError(_)
        )
    }

    /// Check if error is related to file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(self, EngineError::DownloadIoError(_))
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            EngineError::NetworkError { .. } | EngineError::Timeout(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            EngineError::HttpStatus { status: 404, .. } | EngineError::NoDataFound(_) => {
                "This title is no longer available on the source site.".to_string()
            }
            EngineError::DownloadIoError(_) => {
                "Could not write the download to storage. Free up space and try again.".to_string()
            }
            EngineError::FileSizeMismatch { expected, actual } => {
                format!(
                    "Download verification failed (expected {} MB, got {} MB). Please try again.",
                    expected / 1_000_000,
                    actual / 1_000_000
                )
            }
            _ => self.to_string(),
        }
    }
}
