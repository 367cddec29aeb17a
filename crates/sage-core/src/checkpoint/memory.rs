use super::{Checkpoint, CheckpointStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory checkpoint store; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        Ok(self.checkpoints.write().await.remove(thread_id).is_some())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut threads: Vec<String> = self.checkpoints.read().await.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}
