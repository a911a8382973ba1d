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

//! `DownloadStore` on the `Downloads` table

use crate::download::models::{ContentType, DownloadItem, DownloadStatus};
use crate::download::store::DownloadStore;
use crate::error::{EngineError, Result};
use crate::storage::database::Database;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct SqliteDownloadStore {
    db: Database,
}

impl SqliteDownloadStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DownloadStore for SqliteDownloadStore {
    async fn insert(&self, item: &DownloadItem) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO Downloads (
                id, title, poster_url, content_type, video_url, file_path,
                file_size, progress, status, error_message, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.poster_url)
        .bind(item.content_type.as_str())
        .bind(&item.video_url)
        .bind(&item.file_path)
        .bind(item.file_size)
        .bind(item.progress as i64)
        .bind(item.status.as_str())
        .bind(&item.error_message)
        .bind(item.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                EngineError::invalid_state(format!("Download already exists: {}", item.id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, item: &DownloadItem) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE Downloads SET
                title = ?, poster_url = ?, content_type = ?, video_url = ?,
                file_path = ?, file_size = ?, progress = ?, status = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.title)
        .bind(&item.poster_url)
        .bind(item.content_type.as_str())
        .bind(&item.video_url)
        .bind(&item.file_path)
        .bind(item.file_size)
        .bind(item.progress as i64)
        .bind(item.status.as_str())
        .bind(&item.error_message)
        .bind(&item.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("Download {}", item.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM Downloads WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_all(&self) -> Result<Vec<DownloadItem>> {
        let rows = sqlx::query("SELECT * FROM Downloads ORDER BY created_at ASC, rowid ASC")
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn query_by_id(&self, id: &str) -> Result<Option<DownloadItem>> {
        let row = sqlx::query("SELECT * FROM Downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(row_to_item).transpose()
    }
}

fn row_to_item(row: SqliteRow) -> Result<DownloadItem> {
    let status: String = row.try_get("status")?;
    let content_type: String = row.try_get("content_type")?;
    let created_at: String = row.try_get("created_at")?;
    let progress: i64 = row.try_get("progress")?;

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::InvalidInput(format!("Bad created_at {}: {}", created_at, e)))?;

    Ok(DownloadItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        poster_url: row.try_get("poster_url")?,
        content_type: ContentType::from_str(&content_type)?,
        video_url: row.try_get("video_url")?,
        file_path: row.try_get("file_path")?,
        file_size: row.try_get("file_size")?,
        progress: progress.clamp(0, 100) as u8,
        status: DownloadStatus::from_str(&status)?,
        error_message: row.try_get("error_message")?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteDownloadStore {
        SqliteDownloadStore::new(Database::new_in_memory().await.unwrap())
    }

    fn item(id: &str) -> DownloadItem {
        DownloadItem::new(
            id.to_string(),
            "خانه - قسمت ۱".to_string(),
            Some("https://namakade.com/poster.jpg".to_string()),
            ContentType::Episode,
            "https://negahestan.com/e1.mp4".to_string(),
            format!("/tmp/{}.mp4", id),
        )
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let store = store().await;
        let original = item("episode_1");
        store.insert(&original).await.unwrap();

        let loaded = store.query_by_id("episode_1").await.unwrap().unwrap();
        assert_eq!(loaded.title, original.title);
        assert_eq!(loaded.poster_url, original.poster_url);
        assert_eq!(loaded.content_type, ContentType::Episode);
        assert_eq!(loaded.status, DownloadStatus::Pending);
        assert_eq!(loaded.created_at.timestamp_micros(), original.created_at.timestamp_micros());

        assert!(store.query_by_id("episode_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_invalid_state() {
        let store = store().await;
        store.insert(&item("movie_1")).await.unwrap();
        assert!(matches!(
            store.insert(&item("movie_1")).await.unwrap_err(),
            EngineError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = store().await;
        let mut record = item("movie_1");
        store.insert(&record).await.unwrap();

        record.status = DownloadStatus::Failed;
        record.error_message = Some("Download interrupted: reset".into());
        record.file_size = 1024;
        record.progress = 40;
        store.update(&record).await.unwrap();

        let loaded = store.query_by_id("movie_1").await.unwrap().unwrap();
        assert_eq!(loaded.status, DownloadStatus::Failed);
        assert_eq!(loaded.file_size, 1024);
        assert_eq!(loaded.progress, 40);
        assert_eq!(loaded.error_message.as_deref(), Some("Download interrupted: reset"));

        assert!(store.delete("movie_1").await.unwrap());
        assert!(matches!(
            store.update(&record).await.unwrap_err(),
            EngineError::RecordNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_query_all_in_queue_order() {
        let store = store().await;
        for id in ["movie_9", "episode_3", "movie_1"] {
            store.insert(&item(id)).await.unwrap();
        }
        let ids: Vec<String> = store.query_all().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["movie_9", "episode_3", "movie_1"]);
    }
}
