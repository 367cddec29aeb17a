//! SQLite checkpoint backend
//!
//! One row per thread, upserted after every transition. WAL journaling keeps
//! readers (`sage state`) from blocking a running turn.

use super::{Checkpoint, CheckpointStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite checkpoint store
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) a database at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created or migrated.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Checkpoint(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Checkpoint(format!("Invalid SQLite path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Checkpoint(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "SQLite checkpoint store initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                checkpoint TEXT NOT NULL,
                cursor TEXT NOT NULL,
                step INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Checkpoint(format!("Failed to create checkpoints table: {}", e)))?;

        debug!("SQLite checkpoint schema initialized");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        let data = serde_json::to_string(checkpoint)
            .map_err(|e| Error::Checkpoint(format!("Failed to serialize checkpoint: {}", e)))?;
        let step = i64::try_from(checkpoint.step).unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, checkpoint, cursor, step, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                checkpoint = excluded.checkpoint,
                cursor = excluded.cursor,
                step = excluded.step,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(&data)
        .bind(checkpoint.cursor.to_string())
        .bind(step)
        .bind(checkpoint.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Checkpoint(format!("Failed to save checkpoint: {}", e)))?;

        debug!(thread_id = %thread_id, cursor = %checkpoint.cursor, "Checkpoint saved to SQLite");
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT checkpoint FROM checkpoints WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Checkpoint(format!("Failed to load checkpoint: {}", e)))?;

        row.map(|(data,)| {
            serde_json::from_str(&data).map_err(|e| {
                Error::Checkpoint(format!("Failed to deserialize checkpoint: {}", e))
            })
        })
        .transpose()
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Checkpoint(format!("Failed to delete checkpoint: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT thread_id FROM checkpoints ORDER BY thread_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::Checkpoint(format!("Failed to list threads: {}", e)))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
