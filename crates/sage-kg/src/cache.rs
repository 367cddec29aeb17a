//! Entity cache in front of the graph store.
//!
//! Seed entries (the local knowledge file) are pinned and never expire.
//! Entries learned from the remote store live for the process lifetime, or
//! until the optional TTL runs out.

use crate::error::Result;
use crate::types::{EntityRecord, Subgraph};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache boundary injected into the agent
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Cached record for `entity`, if present and fresh
    async fn get(&self, entity: &str) -> Option<EntityRecord>;

    /// Insert or replace the record for `entity` (last writer wins)
    async fn put(&self, entity: &str, record: EntityRecord);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    record: EntityRecord,
    /// `None` for pinned entries
    inserted_at: Option<Instant>,
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Create an empty cache without expiry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire learned entries after `ttl`
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Create a cache pinned with the given records
    #[must_use]
    pub fn from_subgraph(seed: Subgraph) -> Self {
        let entries = seed
            .into_iter()
            .map(|(entity, record)| {
                (
                    entity,
                    CacheEntry {
                        record,
                        inserted_at: None,
                    },
                )
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
            ttl: None,
        }
    }

    /// Load pinned records from a JSON object `{ "<entity>": EntityRecord }`
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub async fn load_seed(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let seed: Subgraph = serde_json::from_str(&json)?;
        Ok(Self::from_subgraph(seed))
    }

    /// Number of entries, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match (self.ttl, entry.inserted_at) {
            (Some(ttl), Some(at)) => at.elapsed() < ttl,
            _ => true,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, entity: &str) -> Option<EntityRecord> {
        let entries = self.entries.read().await;
        entries
            .get(entity)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.record.clone())
    }

    async fn put(&self, entity: &str, record: EntityRecord) {
        self.entries.write().await.insert(
            entity.to_string(),
            CacheEntry {
                record,
                inserted_at: Some(Instant::now()),
            },
        );
    }
}
