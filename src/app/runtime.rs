//! Runtime assembly
//!
//! Builds the stores, workers and graph described by [`AppConfig`].

use super::config::{AppConfig, KnowledgeGraphAppConfig, WorkerKind};
use super::providers::resolve_llm_provider;
use anyhow::{bail, Context, Result};
use sage_core::{
    EventBus, GraphBuilder, GraphConfig, HttpRetriever, IntentClassifier, JsonFileLog,
    NullRetriever, OrchestrationGraph, PersonaConfig, PersonaWorker, ResearchWorker, RetryConfig,
    Retriever, Roster, Supervisor, WorkerAgent, WorkerEdge, WorkerProfile,
};
use sage_kg::{
    CacheStore, GraphStore, InMemoryGraphStore, KnowledgeGraphAgent, KnowledgeGraphConfig,
    MemoryCache, RedisGraphStore,
};
use sage_llm::LlmProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a CLI command needs
pub struct Runtime {
    pub graph: Arc<OrchestrationGraph>,
    pub event_bus: Arc<EventBus>,
    pub knowledge_graph: Option<Arc<KnowledgeGraphAgent>>,
}

/// Build the knowledge graph agent if enabled
pub async fn build_knowledge_graph(
    config: &KnowledgeGraphAppConfig,
) -> Result<Option<Arc<KnowledgeGraphAgent>>> {
    if !config.enabled {
        return Ok(None);
    }

    let store: Arc<dyn GraphStore> = match &config.local_graph {
        Some(path) => {
            let store = InMemoryGraphStore::load(path)
                .await
                .with_context(|| format!("Failed to load local graph from {}", path))?;
            info!(path = %path, nodes = store.node_count(), "Local knowledge graph loaded");
            Arc::new(store)
        }
        None => {
            let store = RedisGraphStore::new(&config.redis_url, &config.graph_name)
                .context("Failed to create RedisGraph store")?;
            info!(graph = %config.graph_name, "RedisGraph store configured");
            Arc::new(store)
        }
    };

    let mut cache = match &config.cache_seed {
        Some(path) => MemoryCache::load_seed(path)
            .await
            .with_context(|| format!("Failed to load cache seed from {}", path))?,
        None => MemoryCache::new(),
    };
    if let Some(ttl) = config.cache_ttl_secs {
        cache = cache.with_ttl(Duration::from_secs(ttl));
    }
    let cache: Arc<dyn CacheStore> = Arc::new(cache);

    let agent_config = KnowledgeGraphConfig {
        terminal_label: config.terminal_label.clone(),
        limit: config.limit,
        query_timeout: Duration::from_secs(config.query_timeout_secs),
    };
    Ok(Some(Arc::new(KnowledgeGraphAgent::new(
        store,
        cache,
        agent_config,
    ))))
}

fn build_retriever(config: &AppConfig) -> Result<Arc<dyn Retriever>> {
    match &config.retriever.endpoint {
        Some(endpoint) => {
            let retriever =
                HttpRetriever::new(endpoint, Duration::from_secs(config.retriever.timeout_secs))
                    .context("Failed to create retrieval client")?;
            info!(endpoint = %endpoint, "HTTP retriever configured");
            Ok(Arc::new(retriever))
        }
        None => Ok(Arc::new(NullRetriever)),
    }
}

fn build_workers(
    config: &AppConfig,
    provider: &Arc<dyn LlmProvider>,
    knowledge_graph: Option<&Arc<KnowledgeGraphAgent>>,
) -> Result<Vec<Arc<dyn WorkerAgent>>> {
    let retriever = build_retriever(config)?;
    let mut workers: Vec<Arc<dyn WorkerAgent>> = Vec::new();
    for worker in &config.supervisor.workers {
        match worker.kind {
            WorkerKind::Persona => {
                let prompt = worker
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| format!("You are a {}", worker.name));
                workers.push(Arc::new(PersonaWorker::new(
                    provider.clone(),
                    PersonaConfig::new(&worker.name, prompt),
                )));
            }
            WorkerKind::Research => {
                let mut research =
                    ResearchWorker::new(provider.clone(), retriever.clone()).with_name(&worker.name);
                if let Some(prompt) = &worker.system_prompt {
                    research = research.with_system_prompt(prompt);
                }
                if let Some(agent) = knowledge_graph {
                    research = research
                        .with_knowledge_graph(agent.clone())
                        .with_graph_timeout(graph_step_timeout(config));
                }
                workers.push(Arc::new(research));
            }
        }
    }
    Ok(workers)
}

/// Budget for the researcher's graph step: past every per-entity query,
/// short of the worker's own deadline
fn graph_step_timeout(config: &AppConfig) -> Duration {
    let query = Duration::from_secs(config.knowledge_graph.query_timeout_secs);
    let call = Duration::from_secs(config.graph.call_timeout_secs);
    query + (call.saturating_sub(query)) / 2
}

/// Assemble the compiled graph
pub async fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    if config.knowledge_graph.enabled
        && config.knowledge_graph.query_timeout_secs >= config.graph.call_timeout_secs
    {
        bail!(
            "knowledge_graph.query_timeout_secs ({}) must be below graph.call_timeout_secs ({})",
            config.knowledge_graph.query_timeout_secs,
            config.graph.call_timeout_secs
        );
    }

    let provider = resolve_llm_provider(&config.llm)?;
    let knowledge_graph = build_knowledge_graph(&config.knowledge_graph).await?;

    let roster = Roster::new(
        config
            .supervisor
            .workers
            .iter()
            .map(|w| WorkerProfile::new(&w.name, &w.description))
            .collect(),
    )?;
    let supervisor = Supervisor::new(provider.clone(), roster)
        .with_timeout(Duration::from_secs(config.supervisor.timeout_secs))
        .with_retry(RetryConfig::new().with_max_attempts(config.supervisor.max_attempts));

    let checkpoints = config
        .checkpoint
        .build()
        .await
        .context("Failed to open checkpoint store")?;
    info!(backend = %checkpoints.name(), "Checkpoint store ready");

    let event_bus = Arc::new(EventBus::default());
    let graph_config = GraphConfig {
        worker_edge: if config.graph.loop_back {
            WorkerEdge::Supervisor
        } else {
            WorkerEdge::Finish
        },
        max_steps: config.graph.max_steps,
        call_timeout: Duration::from_secs(config.graph.call_timeout_secs),
    };

    let mut builder = GraphBuilder::new()
        .with_supervisor(supervisor)
        .with_config(graph_config)
        .with_checkpoint_store(checkpoints)
        .with_event_bus(event_bus.clone());
    for worker in build_workers(config, &provider, knowledge_graph.as_ref())? {
        builder = builder.with_worker(worker);
    }
    if config.graph.intent_enabled {
        let log = Arc::new(JsonFileLog::new(&config.intent_log.path));
        builder = builder.with_intent_classifier(
            IntentClassifier::new(provider.clone(), log)
                .with_timeout(Duration::from_secs(config.graph.call_timeout_secs)),
        );
    }

    Ok(Runtime {
        graph: Arc::new(builder.compile()?),
        event_bus,
        knowledge_graph,
    })
}
