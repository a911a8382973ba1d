//! Database migrations
//!
//! Runtime SQL rather than `sqlx::migrate!`, which needs the SQL files at
//! build time. Applied migrations are tracked in `_migrations`.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_migrations_table(pool).await?;

    run_migration(pool, 1, "downloads", create_downloads_table(pool)).await?;
    run_migration(pool, 2, "downloads_status_index", create_status_index(pool)).await?;

    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Run one migration unless already recorded
async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    migration_fn: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if applied.is_some() {
        return Ok(());
    }

    migration_fn.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    tracing::debug!(id, name, "migration applied");
    Ok(())
}

async fn create_downloads_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
CREATE TABLE IF NOT EXISTS Downloads (
    id TEXT PRIMARY KEY,                 -- movie_<n> / episode_<n>
    title TEXT NOT NULL,
    poster_url TEXT,
    content_type TEXT NOT NULL,          -- MOVIE | EPISODE
    video_url TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_size INTEGER NOT NULL DEFAULT 0,
    progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
    status TEXT NOT NULL,                -- PENDING | DOWNLOADING | PAUSED | COMPLETED | FAILED | CANCELLED
    error_message TEXT,
    created_at TEXT NOT NULL             -- RFC 3339, queue order
);
        "#,
    )
    .await?;

    Ok(())
}

async fn create_status_index(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
CREATE INDEX IF NOT EXISTS idx_downloads_status ON Downloads(status);
CREATE INDEX IF NOT EXISTS idx_downloads_created_at ON Downloads(created_at);
        "#,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        db.migrate().await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(applied, 2);
    }
}
