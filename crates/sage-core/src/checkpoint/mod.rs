//! Checkpoint storage backends
//!
//! A checkpoint is the full conversation state plus the graph position,
//! saved after every completed transition and keyed by thread id.
//!
//! - `MemoryCheckpointStore`: tests and single-process demos
//! - `SqliteCheckpointStore`: default persistent backend
//! - `RedisCheckpointStore`: shared backend for several processes

mod memory;
mod redis_store;
mod sqlite_store;


pub use memory::MemoryCheckpointStore;
pub use redis_store::RedisCheckpointStore;
pub use sqlite_store::SqliteCheckpointStore;

use crate::error::{Error, Result};
use crate::graph::Node;
use crate::state::ConversationState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Saved position of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State after the last completed transition
    pub state: ConversationState,
    /// Node to execute next; [`Node::Finish`] once the turn is over
    pub cursor: Node,
    /// Transitions completed in the current turn
    pub step: usize,
    /// Message count before the current turn's input was applied
    pub turn_start: usize,
    /// When this checkpoint was written
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint for a turn about to start at `cursor`
    #[must_use]
    pub fn new(state: ConversationState, cursor: Node, turn_start: usize) -> Self {
        Self {
            state,
            cursor,
            step: 0,
            turn_start,
            updated_at: Utc::now(),
        }
    }

    /// True once the turn reached FINISH
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor == Node::Finish
    }

    /// Thread this checkpoint belongs to
    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.state.thread_id
    }
}

/// Checkpoint store keyed by thread id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Insert or replace the checkpoint for `thread_id`
    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()>;

    /// Latest checkpoint for `thread_id`
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Remove a thread; returns whether it existed
    async fn delete(&self, thread_id: &str) -> Result<bool>;

    /// All thread ids with a checkpoint
    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// Checkpoint backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointBackendConfig {
    /// "sqlite" (default), "redis" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// SQLite database path; relative paths resolve under `~/.sage`
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Redis URL (backend = "redis")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Redis key prefix
    #[serde(default = "default_prefix")]
    pub redis_prefix: String,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_sqlite_path() -> String {
    "checkpoints.db".to_string()
}

fn default_prefix() -> String {
    "sage:checkpoint:".to_string()
}

impl Default for CheckpointBackendConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
            redis_url: None,
            redis_prefix: default_prefix(),
        }
    }
}

impl CheckpointBackendConfig {
    /// Resolve the SQLite path against `~/.sage`
    ///
    /// # Errors
    /// Returns error if a relative path is given and the home directory is unknown
    pub fn resolved_sqlite_path(&self) -> Result<PathBuf> {
        let path = PathBuf::from(&self.sqlite_path);
        if path.is_absolute() {
            return Ok(path);
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Configuration("could not determine home directory".into()))?;
        Ok(home.join(".sage").join(path))
    }

    /// Build the configured store
    ///
    /// # Errors
    /// Returns error for an unknown backend or if the backend cannot be opened
    pub async fn build(&self) -> Result<Arc<dyn CheckpointStore>> {
        match self.backend.as_str() {
            "sqlite" => {
                let path = self.resolved_sqlite_path()?;
                Ok(Arc::new(SqliteCheckpointStore::new(&path).await?))
            }
            "redis" => {
                let url = self
                    .redis_url
                    .as_deref()
                    .unwrap_or("redis://localhost:6379");
                Ok(Arc::new(RedisCheckpointStore::with_prefix(
                    url,
                    &self.redis_prefix,
                )?))
            }
            "memory" => Ok(Arc::new(MemoryCheckpointStore::new())),
            other => Err(Error::Configuration(format!(
                "Unknown checkpoint backend: '{}'. Use 'sqlite', 'redis', or 'memory'.",
                other
            ))),
        }
    }
}
