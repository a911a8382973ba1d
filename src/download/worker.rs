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

//! Resumable single-file transfer
//!
//! # Resume mechanism
//! 1. The byte offset is the length of the file already on disk.
//! 2. Send `Range: bytes={offset}-`.
//! 3. `206` → append; the total comes from `Content-Range: bytes a-b/total`.
//!    `200` → the server ignored the range, truncate and start over.
//!    `416` at exactly the known total → the file is already complete.
//! 4. Body bytes are regrouped into `chunk_size` blocks. Each block is
//!    written and flushed before the cancellation token is looked at, so a
//!    stop always lands on a block boundary.
//!
//! Network failures (connect errors, stalled reads, truncated bodies, 5xx)
//! are retried with exponential backoff; each retry re-reads the offset from
//! disk. Disk errors are returned immediately.

use crate::config::DownloadConfig;
use crate::download::models::DownloadItem;
use crate::download::progress::{DownloadProgress, ProgressTracker};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Receives throttled progress from a running transfer
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: DownloadProgress);
}

/// How a transfer ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// File is complete and verified
    Completed { size: u64 },
    /// Stopped by the cancellation token; the file ends on a block boundary
    Stopped { written: u64 },
}

#[derive(Debug, Clone)]
pub struct DownloadWorker {
    client: Client,
    config: DownloadConfig,
}

impl DownloadWorker {
    pub fn new(client: Client, config: DownloadConfig) -> Self {
        Self { client, config }
    }

    /// Transfer `item.video_url` into `item.file_path`, resuming from
    /// whatever is already on disk.
    pub async fn run(
        &self,
        item: &DownloadItem,
        token: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<TransferOutcome> {
        let path = Path::new(&item.file_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut expected_total = (item.file_size > 0).then_some(item.file_size as u64);
        let mut attempt = 0u32;

        loop {
            if token.is_cancelled() {
                return Ok(TransferOutcome::Stopped {
                    written: file_length(path).await?,
                });
            }

            let error = match self
                .transfer_once(item, path, &mut expected_total, token, sink)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.config.max_retries {
                tracing::error!(id = %item.id, attempt, error = %error, "transfer failed");
                return Err(error);
            }

            attempt += 1;
            let delay = self.config.backoff_for(attempt);
            tracing::warn!(
                id = %item.id,
                attempt,
                max = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transfer interrupted, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    return Ok(TransferOutcome::Stopped {
                        written: file_length(path).await?,
                    });
                }
            }
        }
    }

    async fn transfer_once(
        &self,
        item: &DownloadItem,
        path: &Path,
        expected_total: &mut Option<u64>,
        token: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<TransferOutcome> {
        let mut offset = file_length(path).await?;

        if let Some(total) = *expected_total {
            if offset == total {
                return Ok(TransferOutcome::Completed { size: total });
            }
            if offset > total {
                tracing::warn!(id = %item.id, offset, total, "partial file larger than source, restarting");
                fs::File::create(path).await?;
                offset = 0;
            }
        }

        let mut request = self.client.get(&item.video_url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let sent = tokio::select! {
            sent = tokio::time::timeout(self.config.connect_timeout(), request.send()) => sent,
            _ = token.cancelled() => {
                return Ok(TransferOutcome::Stopped { written: offset });
            }
        };
        let response = sent
            .map_err(|_| EngineError::Timeout(self.config.connect_timeout_secs))?
            .map_err(interrupted)?;

        let status = response.status();
        let (start, total) = match status {
            StatusCode::PARTIAL_CONTENT => {
                let total = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(content_range_total)
                    .or_else(|| response.content_length().map(|len| offset + len));
                (offset, total)
            }
            StatusCode::OK => {
                if offset > 0 {
                    tracing::warn!(id = %item.id, offset, "server ignored range request, restarting from zero");
                }
                (0, response.content_length())
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let remote_total = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(content_range_total);
                if offset > 0 && (remote_total == Some(offset) || *expected_total == Some(offset)) {
                    return Ok(TransferOutcome::Completed { size: offset });
                }
                return Err(EngineError::RangeNotSatisfiable { offset });
            }
            other => {
                return Err(EngineError::HttpStatus {
                    status: other.as_u16(),
                    url: item.video_url.clone(),
                })
            }
        };

        if let (Some(previous), Some(current)) = (*expected_total, total) {
            if previous != current {
                // Remote file changed under us; the partial is useless
                tracing::warn!(id = %item.id, previous, current, "remote size changed, restarting");
                fs::File::create(path).await?;
                *expected_total = Some(current);
                return Err(EngineError::DownloadNetworkError(
                    "Remote file changed during transfer".to_string(),
                ));
            }
        }
        if total.is_some() {
            *expected_total = total;
        }

        // A cancel may already have removed the partial file
        if token.is_cancelled() {
            return Ok(TransferOutcome::Stopped { written: offset });
        }

        let mut file = if start == 0 {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await?
        } else {
            OpenOptions::new().create(true).append(true).open(path).await?
        };

        tracing::debug!(id = %item.id, start, total = ?total, "transfer started");

        let mut tracker = ProgressTracker::new(item.id.clone(), start, total.unwrap_or(0));
        sink.report(tracker.snapshot()).await;

        let chunk_size = self.config.chunk_size.max(1);
        let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut written = start;
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                next = tokio::time::timeout(self.config.chunk_timeout(), stream.next()) => next,
                _ = token.cancelled() => {
                    written += write_block(&mut file, &mut buffer).await?;
                    return Ok(TransferOutcome::Stopped { written });
                }
            };

            match next {
                Ok(Some(Ok(bytes))) => {
                    buffer.extend_from_slice(&bytes);
                    if buffer.len() < chunk_size {
                        continue;
                    }

                    written += write_block(&mut file, &mut buffer).await?;
                    if tracker.update(written) {
                        sink.report(tracker.snapshot()).await;
                    }

                    if token.is_cancelled() {
                        return Ok(TransferOutcome::Stopped { written });
                    }
                }
                Ok(Some(Err(e))) => {
                    write_block(&mut file, &mut buffer).await?;
                    return Err(interrupted(e));
                }
                Ok(None) => break,
                Err(_) => {
                    write_block(&mut file, &mut buffer).await?;
                    return Err(EngineError::DownloadNetworkError(format!(
                        "No data received for {}s",
                        self.config.chunk_timeout_secs
                    )));
                }
            }
        }

        written += write_block(&mut file, &mut buffer).await?;
        file.sync_all().await?;
        drop(file);

        if tracker.update(written) {
            sink.report(tracker.snapshot()).await;
        }

        let actual = file_length(path).await?;
        match total {
            Some(expected) if actual < expected => Err(EngineError::DownloadNetworkError(format!(
                "Connection closed early: {}/{} bytes",
                actual, expected
            ))),
            Some(expected) if actual > expected => Err(EngineError::FileSizeMismatch {
                expected,
                actual,
            }),
            _ => Ok(TransferOutcome::Completed { size: actual }),
        }
    }
}

/// Write and flush whatever is buffered. Returns the byte count.
async fn write_block(file: &mut fs::File, buffer: &mut Vec<u8>) -> Result<u64> {
    if buffer.is_empty() {
        return Ok(0);
    }
    file.write_all(buffer).await?;
    file.flush().await?;
    let len = buffer.len() as u64;
    buffer.clear();
    Ok(len)
}

async fn file_length(path: &Path) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn interrupted(err: reqwest::Error) -> EngineError {
    EngineError::DownloadNetworkError(err.to_string())
}

/// Total from `bytes 100-199/200` or `bytes */200`
fn content_range_total(header: &str) -> Option<u64> {
    header
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("bytes 1000-1999/2000"), Some(2000));
        assert_eq!(content_range_total("bytes */512"), Some(512));
        assert_eq!(content_range_total("bytes 0-9/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn test_file_length_of_missing_file_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_length(&dir.path().join("nope.mp4")).await.unwrap(), 0);

        let path = dir.path().join("some.mp4");
        tokio::fs::write(&path, b"12345").await.unwrap();
        assert_eq!(file_length(&path).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_write_block_drains_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut file = fs::File::create(&path).await.unwrap();

        let mut buffer = b"abcdef".to_vec();
        assert_eq!(write_block(&mut file, &mut buffer).await.unwrap(), 6);
        assert!(buffer.is_empty());
        assert_eq!(write_block(&mut file, &mut buffer).await.unwrap(), 0);

        drop(file);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abcdef");
    }
}
