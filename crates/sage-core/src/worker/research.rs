use super::{Retriever, WorkerAgent};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sage_kg::{extract_entity_ids, KnowledgeGraphAgent};
use sage_llm::{CompletionRequest, LlmProvider, Message, MessageRole};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_PROMPT: &str = "You are a research assistant. Answer using the retrieved context \
and knowledge graph facts below. Cite the studies you rely on. If the context does not \
contain the answer, say so.";

/// Bound on the whole knowledge-graph step; sits between the agent's
/// per-query timeout and the graph's per-call timeout
const DEFAULT_GRAPH_TIMEOUT: Duration = Duration::from_secs(20);

/// Worker backed by a retrieval chain, enriched by the knowledge graph
pub struct ResearchWorker {
    name: String,
    provider: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    knowledge_graph: Option<Arc<KnowledgeGraphAgent>>,
    graph_timeout: Duration,
    system_prompt: String,
    model: Option<String>,
}

impl ResearchWorker {
    /// Create a researcher named `researcher`
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            name: "researcher".to_string(),
            provider,
            retriever,
            knowledge_graph: None,
            graph_timeout: DEFAULT_GRAPH_TIMEOUT,
            system_prompt: DEFAULT_PROMPT.to_string(),
            model: None,
        }
    }

    /// Register under another name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enrich answers with knowledge-graph lookups
    #[must_use]
    pub fn with_knowledge_graph(mut self, agent: Arc<KnowledgeGraphAgent>) -> Self {
        self.knowledge_graph = Some(agent);
        self
    }

    /// Bound on the knowledge-graph step; on expiry the answer goes out
    /// without graph context. Keep it below the graph's per-call timeout.
    #[must_use]
    pub fn with_graph_timeout(mut self, timeout: Duration) -> Self {
        self.graph_timeout = timeout;
        self
    }

    /// Replace the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Knowledge-graph summary for entities named in `query`; lookup
    /// problems are logged and never fail the worker.
    async fn graph_context(&self, query: &str) -> Option<String> {
        let agent = self.knowledge_graph.as_ref()?;
        let entities = extract_entity_ids(query);
        if entities.is_empty() {
            return None;
        }

        let lookup = tokio::time::timeout(self.graph_timeout, agent.lookup(&entities));
        let Ok(outcome) = lookup.await else {
            let err = Error::UpstreamTimeout {
                component: "knowledge graph".to_string(),
                timeout_ms: u64::try_from(self.graph_timeout.as_millis()).unwrap_or(u64::MAX),
            };
            warn!(
                worker = %self.name,
                entities = entities.len(),
                error = %err,
                "Continuing without graph context"
            );
            return None;
        };
        for failure in &outcome.failures {
            let err = Error::GraphLookup {
                entity: failure.entity.clone(),
                message: failure.error.clone(),
            };
            warn!(worker = %self.name, error = %err, "Continuing without entity");
        }
        outcome.render_summary()
    }

    fn compose_system_prompt(&self, context: &str, graph: Option<&str>) -> String {
        let mut prompt = self.system_prompt.clone();
        if !context.trim().is_empty() {
            prompt.push_str("\n\nRetrieved context:\n");
            prompt.push_str(context.trim());
        }
        if let Some(graph) = graph {
            prompt.push_str("\n\n");
            prompt.push_str(graph.trim_end());
        }
        prompt
    }
}

#[async_trait]
impl WorkerAgent for ResearchWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, history: &[Message]) -> Result<Message> {
        let query = history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .ok_or_else(|| Error::agent(&self.name, "no user utterance in history"))?;

        let context = self
            .retriever
            .retrieve(query)
            .await
            .map_err(|e| Error::agent(&self.name, e))?;
        let graph = self.graph_context(query).await;
        debug!(
            worker = %self.name,
            context_chars = context.len(),
            graph = graph.is_some(),
            "Research context assembled"
        );

        let model = self
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        let request = CompletionRequest::new(model)
            .with_message(Message::system(
                self.compose_system_prompt(&context, graph.as_deref()),
            ))
            .with_messages(history.iter().cloned());

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::agent(&self.name, e))?;
        Ok(Message::assistant(response.content).with_name(&self.name))
    }
}
