//! Download record persistence
//!
//! The manager only talks to a [`DownloadStore`]; where records live is the
//! caller's choice. [`MemoryDownloadStore`] serves tests and ephemeral use,
//! [`SqliteDownloadStore`](crate::storage::SqliteDownloadStore) survives
//! restarts.

use crate::download::models::DownloadItem;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Fails with `InvalidState` if a record with the same id exists
    async fn insert(&self, item: &DownloadItem) -> Result<()>;

    /// Fails with `RecordNotFound` if there is nothing to update
    async fn update(&self, item: &DownloadItem) -> Result<()>;

    /// Returns whether a record was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All records in queue order (oldest first)
    async fn query_all(&self) -> Result<Vec<DownloadItem>>;

    async fn query_by_id(&self, id: &str) -> Result<Option<DownloadItem>>;
}

/// Process-local store, insertion ordered
#[derive(Debug, Default)]
pub struct MemoryDownloadStore {
    items: RwLock<Vec<DownloadItem>>,
}

impl MemoryDownloadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DownloadStore for MemoryDownloadStore {
    async fn insert(&self, item: &DownloadItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(EngineError::invalid_state(format!(
                "Download already exists: {}",
                item.id
            )));
        }
        items.push(item.clone());
        Ok(())
    }

    async fn update(&self, item: &DownloadItem) -> Result<()> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(EngineError::not_found(format!("Download {}", item.id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() != before)
    }

    async fn query_all(&self) -> Result<Vec<DownloadItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn query_by_id(&self, id: &str) -> Result<Option<DownloadItem>> {
        Ok(self.items.read().await.iter().find(|item| item.id == id).cloned())
    }
}
