use super::{Checkpoint, CheckpointStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Redis-backed checkpoint store
///
/// Checkpoints are stored as JSON strings under `<prefix><thread_id>` with
/// no expiry.
pub struct RedisCheckpointStore {
    client: redis::Client,
    prefix: String,
}

impl RedisCheckpointStore {
    /// Create a store with the default `sage:checkpoint:` prefix
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn new(redis_url: &str) -> Result<Self> {
        Self::with_prefix(redis_url, "sage:checkpoint:")
    }

    /// Create a store with a custom key prefix
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Checkpoint(format!("Invalid Redis URL: {}", e)))?;
        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, thread_id: &str) -> String {
        format!("{}{}", self.prefix, thread_id)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Checkpoint(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl CheckpointStore for RedisCheckpointStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_string(checkpoint)
            .map_err(|e| Error::Checkpoint(format!("Failed to serialize checkpoint: {}", e)))?;
        let mut conn = self.connection().await?;

        redis::cmd("SET")
            .arg(self.key(thread_id))
            .arg(&json)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Checkpoint(format!("Redis SET failed: {}", e)))?;

        debug!(thread_id = %thread_id, cursor = %checkpoint.cursor, "Checkpoint saved to Redis");
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let mut conn = self.connection().await?;
        let data: Option<String> = redis::cmd("GET")
            .arg(self.key(thread_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Checkpoint(format!("Redis GET failed: {}", e)))?;

        data.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                Error::Checkpoint(format!("Failed to deserialize checkpoint: {}", e))
            })
        })
        .transpose()
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let deleted: i64 = redis::cmd("DEL")
            .arg(self.key(thread_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Checkpoint(format!("Redis DEL failed: {}", e)))?;
        Ok(deleted > 0)
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}*", self.prefix))
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Checkpoint(format!("Redis KEYS failed: {}", e)))?;

        let mut threads: Vec<String> = keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect();
        threads.sort();
        Ok(threads)
    }
}
