//! Knowledge Graph Agent
//!
//! Resolves seed entities to [`EntityRecord`]s (cache first, then the graph
//! store) and derives [`HiddenInsights`] from the assembled subgraph.

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::pattern::{TwoHopPattern, DEFAULT_LIMIT, DEFAULT_TERMINAL_LABEL};
use crate::store::GraphStore;
use crate::types::{push_unique, EntityRecord, HiddenInsights, LookupFailure, LookupOutcome, Subgraph};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};


/// Lookup parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraphConfig {
    /// Label the terminal node must carry
    pub terminal_label: String,
    /// Row cap per seed
    pub limit: usize,
    /// Bound on each remote query
    #[serde(with = "duration_ms")]
    pub query_timeout: Duration,
}

impl Default for KnowledgeGraphConfig {
    fn default() -> Self {
        Self {
            terminal_label: DEFAULT_TERMINAL_LABEL.to_string(),
            limit: DEFAULT_LIMIT,
            query_timeout: Duration::from_secs(10),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Knowledge Graph Agent
pub struct KnowledgeGraphAgent {
    store: Arc<dyn GraphStore>,
    cache: Arc<dyn CacheStore>,
    config: KnowledgeGraphConfig,
}

impl KnowledgeGraphAgent {
    /// Create an agent over a store and a cache
    #[must_use]
    pub fn new(
        store: Arc<dyn GraphStore>,
        cache: Arc<dyn CacheStore>,
        config: KnowledgeGraphConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &KnowledgeGraphConfig {
        &self.config
    }

    /// Look up every entity and derive insights.
    ///
    /// A failing entity is recorded in [`LookupOutcome::failures`] and left
    /// out of the subgraph; the rest of the batch still completes. Entities
    /// with no relations are absent from the subgraph and are not cached.
    pub async fn lookup(&self, entities: &[String]) -> LookupOutcome {
        let mut seeds: Vec<String> = Vec::with_capacity(entities.len());
        for entity in entities.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            push_unique(&mut seeds, entity);
        }

        let mut outcome = LookupOutcome::default();
        let mut misses = Vec::new();
        for entity in &seeds {
            match self.cache.get(entity).await {
                Some(record) => {
                    debug!(entity = %entity, "Knowledge graph cache hit");
                    outcome.subgraph.insert(entity.clone(), record);
                }
                None => misses.push(entity.as_str()),
            }
        }

        let fetched = join_all(misses.iter().map(|entity| self.fetch(entity))).await;
        for (entity, result) in misses.into_iter().zip(fetched) {
            match result {
                Ok(record) if record.is_empty() => {
                    debug!(entity = %entity, "No relations found");
                }
                Ok(record) => {
                    self.cache.put(entity, record.clone()).await;
                    outcome.subgraph.insert(entity.to_string(), record);
                }
                Err(e) => {
                    warn!(entity = %entity, error = %e, "Knowledge graph lookup failed");
                    outcome.failures.push(LookupFailure {
                        entity: entity.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome.insights = derive_insights(&seeds, &outcome.subgraph);
        info!(
            seeds = seeds.len(),
            found = outcome.subgraph.len(),
            failed = outcome.failures.len(),
            hidden_concepts = outcome.insights.hidden_concepts.len(),
            "Knowledge graph lookup completed"
        );
        outcome
    }

    /// Resolve a single entity, propagating store errors.
    ///
    /// # Errors
    /// Returns error if the store query fails or times out
    pub async fn query_entity(&self, entity: &str) -> Result<Option<EntityRecord>> {
        if let Some(record) = self.cache.get(entity).await {
            return Ok(Some(record));
        }
        let record = self.fetch(entity).await?;
        if record.is_empty() {
            return Ok(None);
        }
        self.cache.put(entity, record.clone()).await;
        Ok(Some(record))
    }

    async fn fetch(&self, entity: &str) -> Result<EntityRecord> {
        let pattern = TwoHopPattern::new(entity)
            .with_terminal_label(self.config.terminal_label.clone())
            .with_limit(self.config.limit);

        let rows = tokio::time::timeout(self.config.query_timeout, self.store.query(&pattern))
            .await
            .map_err(|_| Error::Timeout {
                entity: entity.to_string(),
                timeout_ms: u64::try_from(self.config.query_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            })?
            .map_err(|e| match e {
                Error::Timeout { .. } | Error::Lookup { .. } => e,
                other => Error::Lookup {
                    entity: entity.to_string(),
                    message: other.to_string(),
                },
            })?;

        Ok(EntityRecord::from_rows(&rows))
    }
}

/// Classify related concepts and collect studies.
///
/// Walks `entities` in order and each record's concepts in order:
/// a concept that is itself a queried entity is important; any other concept
/// that is not a subgraph key is hidden. Every list is free of repeats.
#[must_use]
pub fn derive_insights(entities: &[String], subgraph: &Subgraph) -> HiddenInsights {
    let mut insights = HiddenInsights::default();

    for entity in entities {
        let Some(record) = subgraph.get(entity) else {
            continue;
        };

        for concept in &record.related_concepts {
            if entities.iter().any(|e| e == concept) {
                push_unique(&mut insights.important_entities, concept);
            } else if !subgraph.contains_key(concept) {
                push_unique(&mut insights.hidden_concepts, concept);
            }
        }

        for study in &record.related_studies {
            push_unique(&mut insights.hidden_relationships, study);
        }
    }

    insights
}
