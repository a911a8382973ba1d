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

//! Download queue with pause/resume/cancel and live progress
//!
//! - Records live in an injected [`DownloadStore`]; it is the single source
//!   of truth for status.
//! - Every status or progress write for an id happens under that id's lock,
//!   and worker progress is only persisted while the record still says
//!   `DOWNLOADING`. A pause issued mid-chunk therefore always wins.
//! - A semaphore bounds concurrent transfers; queued workers wait on it in
//!   submission order.
//! - Observers get two `watch` channels: the full record list (re-sent on
//!   every mutation) and an id → percent map (re-sent per published chunk).

use crate::config::DownloadConfig;
use crate::download::models::{ContentType, DownloadItem, DownloadRequest, DownloadStatus};
use crate::download::progress::DownloadProgress;
use crate::download::store::DownloadStore;
use crate::download::worker::{DownloadWorker, ProgressSink, TransferOutcome};
use crate::error::{EngineError, Result};
use crate::file::paths;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long pause/cancel wait for a worker to reach a block boundary
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Live worker bound to a record
struct ActiveDownload {
    token: CancellationToken,
    handle: JoinHandle<()>,
    generation: u64,
}

struct ManagerInner {
    store: Arc<dyn DownloadStore>,
    worker: DownloadWorker,
    config: DownloadConfig,
    semaphore: Arc<Semaphore>,
    record_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    active: Mutex<HashMap<String, ActiveDownload>>,
    next_generation: AtomicU64,
    downloads_tx: watch::Sender<Vec<DownloadItem>>,
    progress_tx: watch::Sender<HashMap<String, u8>>,
    snapshots: RwLock<HashMap<String, DownloadProgress>>,
}

impl ManagerInner {
    async fn lock_record(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.record_locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    fn forget_lock(&self, id: &str) {
        if let Ok(mut locks) = self.record_locks.lock() {
            locks.remove(id);
        }
    }

    async fn require(&self, id: &str) -> Result<DownloadItem> {
        self.store
            .query_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("Download {}", id)))
    }

    async fn publish_downloads(&self) {
        match self.store.query_all().await {
            Ok(items) => {
                self.downloads_tx.send_replace(items);
            }
            Err(e) => tracing::warn!(error = %e, "could not refresh download list"),
        }
    }

    async fn publish_progress(&self, id: &str, percent: u8) {
        self.progress_tx.send_if_modified(|map| {
            let previous = map.insert(id.to_string(), percent);
            previous != Some(percent)
        });
    }

    async fn drop_progress(&self, id: &str) {
        self.snapshots.write().await.remove(id);
        self.progress_tx.send_if_modified(|map| map.remove(id).is_some());
    }

    /// Spawn a worker task for `id`; it waits for a pool slot
    async fn submit(self: &Arc<Self>, id: &str) {
        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut active = self.active.lock().await;
        let handle = tokio::spawn(run_worker(
            Arc::clone(self),
            id.to_string(),
            token.clone(),
            generation,
        ));
        if let Some(previous) = active.insert(
            id.to_string(),
            ActiveDownload {
                token,
                handle,
                generation,
            },
        ) {
            previous.token.cancel();
        }
        tracing::debug!(id = %id, generation, "submitted to worker pool");
    }

    /// Cancel the worker bound to `id` (if any) and wait for it to stop.
    /// A worker still running after `STOP_TIMEOUT` is aborted.
    async fn stop_worker(&self, id: &str) {
        let active = self.active.lock().await.remove(id);
        if let Some(active) = active {
            active.token.cancel();
            let mut handle = active.handle;
            if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!(id = %id, "worker did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }
    }

    async fn release_worker(&self, id: &str, generation: u64) {
        let mut active = self.active.lock().await;
        if active.get(id).map(|a| a.generation) == Some(generation) {
            active.remove(id);
        }
    }
}

/// Persists worker progress, but only while the record is still DOWNLOADING
struct RecordProgress {
    inner: Arc<ManagerInner>,
    id: String,
}

#[async_trait]
impl ProgressSink for RecordProgress {
    async fn report(&self, progress: DownloadProgress) {
        let _guard = self.inner.lock_record(&self.id).await;

        let mut record = match self.inner.store.query_by_id(&self.id).await {
            Ok(Some(record)) if record.status == DownloadStatus::Downloading => record,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "progress lookup failed");
                return;
            }
        };

        let total = progress.total_bytes as i64;
        if record.progress != progress.percent || record.file_size != total {
            record.progress = progress.percent;
            record.file_size = total;
            if let Err(e) = self.inner.store.update(&record).await {
                tracing::warn!(id = %self.id, error = %e, "progress write failed");
                return;
            }
            self.inner.publish_downloads().await;
        }

        self.inner.publish_progress(&self.id, progress.percent).await;
        self.inner
            .snapshots
            .write()
            .await
            .insert(self.id.clone(), progress);
    }
}

async fn run_worker(inner: Arc<ManagerInner>, id: String, token: CancellationToken, generation: u64) {
    let permit = tokio::select! {
        permit = Arc::clone(&inner.semaphore).acquire_owned() => permit,
        _ = token.cancelled() => {
            inner.release_worker(&id, generation).await;
            return;
        }
    };
    let Ok(_permit) = permit else {
        inner.release_worker(&id, generation).await;
        return;
    };

    // PENDING → DOWNLOADING
    let started = {
        let _guard = inner.lock_record(&id).await;
        match inner.store.query_by_id(&id).await {
            Ok(Some(mut item)) if item.status == DownloadStatus::Pending && !token.is_cancelled() => {
                item.status = DownloadStatus::Downloading;
                item.error_message = None;
                match inner.store.update(&item).await {
                    Ok(()) => Some(item),
                    Err(e) => {
                        tracing::error!(id = %id, error = %e, "could not mark download as started");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                tracing::error!(id = %id, error = %e, "could not load download record");
                None
            }
        }
    };
    let Some(item) = started else {
        inner.release_worker(&id, generation).await;
        return;
    };
    inner.publish_downloads().await;
    tracing::info!(id = %id, url = %item.video_url, "download started");

    let sink = RecordProgress {
        inner: Arc::clone(&inner),
        id: id.clone(),
    };
    let result = inner.worker.run(&item, &token, &sink).await;

    {
        let _guard = inner.lock_record(&id).await;
        let current = inner.store.query_by_id(&id).await.ok().flatten();

        match (result, current) {
            (Ok(TransferOutcome::Completed { size }), Some(mut record))
                if record.status == DownloadStatus::Downloading =>
            {
                record.status = DownloadStatus::Completed;
                record.progress = 100;
                record.file_size = size as i64;
                record.error_message = None;
                match inner.store.update(&record).await {
                    Ok(()) => {
                        tracing::info!(id = %id, size, "download completed");
                        inner.publish_progress(&id, 100).await;
                    }
                    Err(e) => tracing::error!(id = %id, error = %e, "could not mark download as completed"),
                }
            }
            (Err(e), Some(mut record)) if record.status == DownloadStatus::Downloading => {
                record.status = DownloadStatus::Failed;
                record.error_message = Some(e.to_string());
                if let Err(store_err) = inner.store.update(&record).await {
                    tracing::error!(id = %id, error = %store_err, "could not mark download as failed");
                }
                tracing::error!(id = %id, error = %e, "download failed");
            }
            (Ok(TransferOutcome::Stopped { written }), Some(record)) => {
                tracing::info!(id = %id, written, status = %record.status, "download stopped");
            }
            (outcome, record) => {
                tracing::debug!(
                    id = %id,
                    outcome = ?outcome.as_ref().map_err(|e| e.to_string()),
                    status = ?record.map(|r| r.status),
                    "worker result superseded"
                );
            }
        }
    }

    inner.publish_downloads().await;
    inner.release_worker(&id, generation).await;
}

/// Cloneable handle; all clones share one queue
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<ManagerInner>,
}

impl DownloadManager {
    pub fn new(store: Arc<dyn DownloadStore>, client: Client, config: DownloadConfig) -> Self {
        let (downloads_tx, _) = watch::channel(Vec::new());
        let (progress_tx, _) = watch::channel(HashMap::new());

        Self {
            inner: Arc::new(ManagerInner {
                store,
                worker: DownloadWorker::new(client, config.clone()),
                semaphore: Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1))),
                config,
                record_locks: std::sync::Mutex::new(HashMap::new()),
                active: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                downloads_tx,
                progress_tx,
                snapshots: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub async fn queue_movie_download(
        &self,
        movie_id: i64,
        title: &str,
        poster_url: Option<&str>,
        video_url: &str,
    ) -> Result<bool> {
        let request = DownloadRequest::Movie {
            movie_id,
            title: title.to_string(),
            poster_url: poster_url.map(str::to_string),
        };
        self.queue(&request, video_url).await
    }

    pub async fn queue_episode_download(
        &self,
        episode_id: i64,
        series_title: &str,
        episode_info: &str,
        poster_url: Option<&str>,
        video_url: &str,
    ) -> Result<bool> {
        let request = DownloadRequest::Episode {
            episode_id,
            series_title: series_title.to_string(),
            episode_info: episode_info.to_string(),
            poster_url: poster_url.map(str::to_string),
        };
        self.queue(&request, video_url).await
    }

    /// Insert a PENDING record and start a worker. Returns false when a
    /// record for the same id already exists and has not failed.
    pub async fn queue(&self, request: &DownloadRequest, video_url: &str) -> Result<bool> {
        if video_url.trim().is_empty() {
            return Err(EngineError::InvalidInput("Empty video URL".to_string()));
        }

        let id = request.id();
        {
            let _guard = self.inner.lock_record(&id).await;

            match self.inner.store.query_by_id(&id).await? {
                Some(existing) if existing.status == DownloadStatus::Failed => {
                    self.reset_failed(existing, Some(video_url)).await?;
                }
                Some(existing) => {
                    tracing::debug!(id = %id, status = %existing.status, "already queued");
                    return Ok(false);
                }
                None => {
                    let (poster_url, content_type) = match request {
                        DownloadRequest::Movie { poster_url, .. } => (poster_url.clone(), ContentType::Movie),
                        DownloadRequest::Episode { poster_url, .. } => (poster_url.clone(), ContentType::Episode),
                    };
                    let path = paths::destination_for(
                        &self.inner.config.download_directory,
                        request,
                        video_url,
                    );
                    let item = DownloadItem::new(
                        id.clone(),
                        request.display_title(),
                        poster_url,
                        content_type,
                        video_url.to_string(),
                        path.to_string_lossy().into_owned(),
                    );
                    self.inner.store.insert(&item).await?;
                    tracing::info!(id = %id, path = %item.file_path, "download queued");
                }
            }
        }

        self.inner.submit(&id).await;
        self.inner.publish_downloads().await;
        Ok(true)
    }

    /// Stop after the current block and keep the partial file
    pub async fn pause_download(&self, id: &str) -> Result<()> {
        {
            let _guard = self.inner.lock_record(id).await;
            let mut record = self.inner.require(id).await?;
            match record.status {
                DownloadStatus::Pending | DownloadStatus::Downloading => {
                    record.status = DownloadStatus::Paused;
                    self.inner.store.update(&record).await?;
                    tracing::info!(id = %id, "download paused");
                }
                DownloadStatus::Paused => return Ok(()),
                DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled => {
                    return Err(EngineError::invalid_state(format!(
                        "Cannot pause {} download {}",
                        record.status, id
                    )))
                }
            }
        }

        self.inner.stop_worker(id).await;
        self.inner.publish_downloads().await;
        Ok(())
    }

    /// Re-queue a paused download; the worker continues from the bytes on
    /// disk
    pub async fn resume_download(&self, id: &str) -> Result<()> {
        {
            let _guard = self.inner.lock_record(id).await;
            let mut record = self.inner.require(id).await?;
            match record.status {
                DownloadStatus::Paused => {
                    record.status = DownloadStatus::Pending;
                    self.inner.store.update(&record).await?;
                    tracing::info!(id = %id, "download resumed");
                }
                DownloadStatus::Pending | DownloadStatus::Downloading => return Ok(()),
                DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled => {
                    return Err(EngineError::invalid_state(format!(
                        "Cannot resume {} download {}",
                        record.status, id
                    )))
                }
            }
        }

        // The paused worker must be gone before a new one opens the file
        self.inner.stop_worker(id).await;
        self.inner.submit(id).await;
        self.inner.publish_downloads().await;
        Ok(())
    }

    /// Stop the worker, delete the partial file, then drop the record
    pub async fn cancel_download(&self, id: &str) -> Result<()> {
        let record = {
            let _guard = self.inner.lock_record(id).await;
            let mut record = self.inner.require(id).await?;
            if record.status == DownloadStatus::Completed {
                return Err(EngineError::invalid_state(format!(
                    "Download {} is completed; delete it instead",
                    id
                )));
            }
            record.status = DownloadStatus::Cancelled;
            self.inner.store.update(&record).await?;
            record
        };
        self.inner.publish_downloads().await;

        self.inner.stop_worker(id).await;
        remove_file_if_exists(&record.file_path).await?;

        {
            let _guard = self.inner.lock_record(id).await;
            self.inner.store.delete(id).await?;
        }
        self.inner.forget_lock(id);
        self.inner.drop_progress(id).await;
        self.inner.publish_downloads().await;

        tracing::info!(id = %id, "download cancelled");
        Ok(())
    }

    /// Remove a finished (completed or failed) download and its file
    pub async fn delete_download(&self, id: &str) -> Result<()> {
        {
            let _guard = self.inner.lock_record(id).await;
            let record = self.inner.require(id).await?;
            match record.status {
                DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled => {}
                DownloadStatus::Pending | DownloadStatus::Downloading | DownloadStatus::Paused => {
                    return Err(EngineError::invalid_state(format!(
                        "Download {} is {}; cancel it instead",
                        id, record.status
                    )))
                }
            }

            remove_file_if_exists(&record.file_path).await?;
            self.inner.store.delete(id).await?;
        }
        self.inner.forget_lock(id);
        self.inner.drop_progress(id).await;
        self.inner.publish_downloads().await;

        tracing::info!(id = %id, "download deleted");
        Ok(())
    }

    /// Start a FAILED download again from zero
    pub async fn retry_download(&self, id: &str) -> Result<()> {
        {
            let _guard = self.inner.lock_record(id).await;
            let record = self.inner.require(id).await?;
            if record.status != DownloadStatus::Failed {
                return Err(EngineError::invalid_state(format!(
                    "Can only retry failed downloads, {} is {}",
                    id, record.status
                )));
            }
            self.reset_failed(record, None).await?;
        }

        self.inner.submit(id).await;
        self.inner.publish_downloads().await;
        Ok(())
    }

    /// Re-attach after a restart: records left DOWNLOADING by a dead process
    /// go back to PENDING, then every PENDING record is submitted in queue
    /// order.
    pub async fn restore(&self) -> Result<usize> {
        let records = self.inner.store.query_all().await?;
        let mut submitted = 0;

        for record in records {
            if self.inner.active.lock().await.contains_key(&record.id) {
                continue;
            }

            let resubmit = {
                let _guard = self.inner.lock_record(&record.id).await;
                match self.inner.store.query_by_id(&record.id).await? {
                    Some(mut current) if current.status == DownloadStatus::Downloading => {
                        current.status = DownloadStatus::Pending;
                        self.inner.store.update(&current).await?;
                        true
                    }
                    Some(current) => current.status == DownloadStatus::Pending,
                    None => false,
                }
            };

            if resubmit {
                self.inner.submit(&record.id).await;
                submitted += 1;
            }
        }

        self.inner.publish_downloads().await;
        tracing::info!(submitted, "download queue restored");
        Ok(submitted)
    }

    /// Live list of every record, re-sent on each mutation
    pub fn all_downloads(&self) -> watch::Receiver<Vec<DownloadItem>> {
        self.inner.downloads_tx.subscribe()
    }

    /// Live id → percent map
    pub fn download_progress(&self) -> watch::Receiver<HashMap<String, u8>> {
        self.inner.progress_tx.subscribe()
    }

    /// Latest byte-level snapshot of a transferring download
    pub async fn progress_snapshot(&self, id: &str) -> Option<DownloadProgress> {
        self.inner.snapshots.read().await.get(id).cloned()
    }

    pub async fn list_downloads(&self) -> Result<Vec<DownloadItem>> {
        self.inner.store.query_all().await
    }

    pub async fn get_download(&self, id: &str) -> Result<Option<DownloadItem>> {
        self.inner.store.query_by_id(id).await
    }

    /// COMPLETED and the file is still on disk
    pub async fn is_downloaded(&self, id: &str) -> Result<bool> {
        match self.inner.store.query_by_id(id).await? {
            Some(record) if record.is_completed() => {
                Ok(fs::try_exists(&record.file_path).await.unwrap_or(false))
            }
            _ => Ok(false),
        }
    }

    /// Workers currently bound to a record (running or waiting for a slot)
    pub async fn active_count(&self) -> usize {
        self.inner.active.lock().await.len()
    }

    /// FAILED → PENDING with the partial file removed. Caller holds the
    /// record lock.
    async fn reset_failed(&self, mut record: DownloadItem, video_url: Option<&str>) -> Result<()> {
        remove_file_if_exists(&record.file_path).await?;
        record.status = DownloadStatus::Pending;
        record.progress = 0;
        record.file_size = 0;
        record.error_message = None;
        if let Some(url) = video_url {
            record.video_url = url.to_string();
        }
        self.inner.store.update(&record).await?;
        self.inner.drop_progress(&record.id).await;
        tracing::info!(id = %record.id, "failed download re-queued");
        Ok(())
    }
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

async fn remove_file_if_exists(path: &str) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::store::MemoryDownloadStore;

    fn manager(dir: &std::path::Path) -> DownloadManager {
        let config = DownloadConfig {
            download_directory: dir.to_path_buf(),
            max_concurrent_downloads: 1,
            ..DownloadConfig::default()
        };
        DownloadManager::new(Arc::new(MemoryDownloadStore::new()), Client::new(), config)
    }

    #[tokio::test]
    async fn test_queue_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        // Paused straight away so the unreachable URL never fails the record
        let first = manager
            .queue_movie_download(1, "Film", None, "http://127.0.0.1:9/a.mp4")
            .await
            .unwrap();
        manager.pause_download("movie_1").await.unwrap();
        let second = manager
            .queue_movie_download(1, "Film", None, "http://127.0.0.1:9/a.mp4")
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(manager.list_downloads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        assert!(matches!(
            manager.resume_download("movie_404").await.unwrap_err(),
            EngineError::RecordNotFound(_)
        ));

        manager
            .queue_movie_download(2, "Film", None, "http://127.0.0.1:9/b.mp4")
            .await
            .unwrap();
        manager.pause_download("movie_2").await.unwrap();

        assert!(matches!(
            manager.delete_download("movie_2").await.unwrap_err(),
            EngineError::InvalidState(_)
        ));
        assert!(matches!(
            manager.retry_download("movie_2").await.unwrap_err(),
            EngineError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        assert!(matches!(
            manager.queue_movie_download(3, "Film", None, "  ").await.unwrap_err(),
            EngineError::InvalidInput(_)
        ));
    }
}
