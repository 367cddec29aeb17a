//! Graph assembly and compile-time validation

use super::node::{GraphConfig, Node, WorkerEdge};
use super::runner::OrchestrationGraph;
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::error::{Error, Result};
use crate::event_bus::EventBus;
use crate::intent::IntentClassifier;
use crate::supervisor::{Supervisor, RESERVED_NAMES};
use crate::worker::WorkerAgent;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builder for [`OrchestrationGraph`]
pub struct GraphBuilder {
    workers: Vec<Arc<dyn WorkerAgent>>,
    supervisor: Option<Supervisor>,
    classifier: Option<IntentClassifier>,
    edges: Vec<(String, Node)>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    event_bus: Option<Arc<EventBus>>,
    cancel: Option<CancellationToken>,
    config: GraphConfig,
}

impl GraphBuilder {
    /// Empty builder with default limits
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            supervisor: None,
            classifier: None,
            edges: Vec::new(),
            checkpoints: None,
            event_bus: None,
            cancel: None,
            config: GraphConfig::default(),
        }
    }

    /// Register a worker
    #[must_use]
    pub fn with_worker(mut self, worker: Arc<dyn WorkerAgent>) -> Self {
        self.workers.push(worker);
        self
    }

    /// Set the routing policy
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: Supervisor) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Enable the intent node as entry
    #[must_use]
    pub fn with_intent_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Static edge from a worker, overriding the default worker edge
    #[must_use]
    pub fn with_edge(mut self, from: impl Into<String>, to: Node) -> Self {
        self.edges.push((from.into(), to));
        self
    }

    /// Default edge for workers without a static edge
    #[must_use]
    pub fn with_worker_edge(mut self, edge: WorkerEdge) -> Self {
        self.config.worker_edge = edge;
        self
    }

    /// Replace all limits
    #[must_use]
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Checkpoint backend (in-memory if unset)
    #[must_use]
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Publish transitions on `bus`
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Graph-wide shutdown token; each turn runs under a child of it
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate the wiring and produce a runnable graph.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGraph`] if the supervisor is missing, the
    /// roster and the registered workers differ, a worker name is empty,
    /// reserved or repeated, an edge leaves an unknown worker or targets an
    /// unknown node or the intent node, or static worker edges form a cycle.
    pub fn compile(self) -> Result<OrchestrationGraph> {
        let supervisor = self
            .supervisor
            .ok_or_else(|| Error::InvalidGraph("no supervisor configured".to_string()))?;

        let mut workers: HashMap<String, Arc<dyn WorkerAgent>> = HashMap::new();
        let mut order = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            let name = worker.name().to_string();
            if name.trim().is_empty() {
                return Err(Error::InvalidGraph("worker name is empty".to_string()));
            }
            if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(&name)) {
                return Err(Error::InvalidGraph(format!(
                    "worker name '{}' is reserved",
                    name
                )));
            }
            if workers.insert(name.clone(), worker).is_some() {
                return Err(Error::InvalidGraph(format!(
                    "worker '{}' registered twice",
                    name
                )));
            }
            order.push(name);
        }

        let roster = supervisor.roster();
        if let Some(missing) = roster.names().find(|n| !workers.contains_key(*n)) {
            return Err(Error::InvalidGraph(format!(
                "supervisor can route to '{}' but no such worker is registered",
                missing
            )));
        }
        if let Some(orphan) = order.iter().find(|n| !roster.contains(n)) {
            return Err(Error::InvalidGraph(format!(
                "worker '{}' is registered but not on the supervisor roster",
                orphan
            )));
        }

        let mut edges: HashMap<String, Node> = HashMap::new();
        for (from, to) in self.edges {
            if !workers.contains_key(&from) {
                return Err(Error::InvalidGraph(format!(
                    "edge from unknown worker '{}'",
                    from
                )));
            }
            match &to {
                Node::Intent => {
                    return Err(Error::InvalidGraph(format!(
                        "edge {} -> intent: the intent node is only an entry",
                        from
                    )))
                }
                Node::Worker(target) if !workers.contains_key(target) => {
                    return Err(Error::InvalidGraph(format!(
                        "edge {} -> {}: unknown worker",
                        from, target
                    )))
                }
                _ => {}
            }
            if edges.insert(from.clone(), to).is_some() {
                return Err(Error::InvalidGraph(format!(
                    "worker '{}' has more than one static edge",
                    from
                )));
            }
        }
        for name in &order {
            edges
                .entry(name.clone())
                .or_insert_with(|| self.config.worker_edge.target());
        }
        detect_cycle(&order, &edges)?;

        if self.config.max_steps == 0 {
            return Err(Error::InvalidGraph("max_steps must be at least 1".to_string()));
        }

        let entry = if self.classifier.is_some() {
            Node::Intent
        } else {
            Node::Supervisor
        };
        info!(
            workers = ?order,
            entry = %entry,
            max_steps = self.config.max_steps,
            "Orchestration graph compiled"
        );

        Ok(OrchestrationGraph {
            workers,
            order,
            supervisor,
            classifier: self.classifier,
            edges,
            entry,
            checkpoints: self
                .checkpoints
                .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new())),
            event_bus: self.event_bus,
            cancel: self.cancel.unwrap_or_default(),
            config: self.config,
            locks: DashMap::new(),
            turns: DashMap::new(),
        })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject worker chains that loop without reaching the supervisor or FINISH.
///
/// Every worker has exactly one outgoing edge, so following the chain from
/// each worker either leaves the worker set or revisits a node.
fn detect_cycle(order: &[String], edges: &HashMap<String, Node>) -> Result<()> {
    for start in order {
        let mut path: Vec<&str> = vec![start.as_str()];
        let mut seen: HashSet<&str> = HashSet::from([start.as_str()]);
        let mut current = start.as_str();
        while let Some(Node::Worker(next)) = edges.get(current) {
            if !seen.insert(next.as_str()) {
                path.push(next.as_str());
                return Err(Error::InvalidGraph(format!(
                    "static edges form a cycle that never reaches the supervisor: {}",
                    path.join(" -> ")
                )));
            }
            path.push(next.as_str());
            current = next.as_str();
        }
    }
    Ok(())
}
