//! Replayable operations
//!
//! A failed resolve or queue call is described by its inputs only, so the
//! caller can store it (or serialize it across a process restart) and hand
//! it back to [`Engine::replay`](crate::engine::Engine::replay).

use crate::download::models::DownloadRequest;
use crate::scrape::models::ScraperOutcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RetryRequest {
    Resolve {
        page_url: String,
    },
    Queue {
        request: DownloadRequest,
        video_url: String,
    },
    DownloadBest {
        page_url: String,
        request: DownloadRequest,
    },
    RetryDownload {
        id: String,
    },
}

impl RetryRequest {
    /// A retry for `resolve(page_url)` when the outcome offers one
    pub fn for_outcome(page_url: &str, outcome: &ScraperOutcome) -> Option<Self> {
        outcome.is_retryable().then(|| RetryRequest::Resolve {
            page_url: page_url.to_string(),
        })
    }

    /// Short label for logs and the retry button tooltip
    pub fn describe(&self) -> String {
        match self {
            RetryRequest::Resolve { page_url } => format!("resolve {}", page_url),
            RetryRequest::Queue { request, .. } => format!("queue {}", request.id()),
            RetryRequest::DownloadBest { request, .. } => format!("download {}", request.id()),
            RetryRequest::RetryDownload { id } => format!("retry {}", id),
        }
    }
}
