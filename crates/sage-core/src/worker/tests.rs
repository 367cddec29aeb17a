use super::*;
use crate::error::Error;
use async_trait::async_trait;
use sage_kg::{
    GraphRow, GraphStore, InMemoryGraphStore, KnowledgeGraphAgent, KnowledgeGraphConfig,
    MemoryCache, NodeSpec, TwoHopPattern,
};
use sage_llm::{MessageRole, MockProvider};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Retriever double recording queries
#[derive(Default)]
struct RecordingRetriever {
    queries: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn retrieve(&self, query: &str) -> crate::Result<String> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());
        if self.fail {
            return Err(Error::Retrieval("index offline".into()));
        }
        Ok("The Framingham study followed cardiac outcomes.".to_string())
    }
}

struct DownStore;

#[async_trait]
impl GraphStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn query(&self, _pattern: &TwoHopPattern) -> sage_kg::Result<Vec<GraphRow>> {
        Err(sage_kg::Error::MalformedResponse("connection refused".into()))
    }
}

fn kg(store: impl GraphStore + 'static) -> Arc<KnowledgeGraphAgent> {
    Arc::new(KnowledgeGraphAgent::new(
        Arc::new(store),
        Arc::new(MemoryCache::new()),
        KnowledgeGraphConfig::default(),
    ))
}

fn heart_graph() -> InMemoryGraphStore {
    InMemoryGraphStore::new()
        .with_node(NodeSpec::new("MONDO:0005267", "heart disease"))
        .with_node(NodeSpec::new("HP:0001635", "congestive heart failure"))
        .with_node(NodeSpec::new("S1", "Framingham Heart Study").with_label("biolink.StudyVariable"))
        .with_edge("MONDO:0005267", "HP:0001635")
        .with_edge("HP:0001635", "S1")
}

fn history() -> Vec<Message> {
    vec![
        Message::user("jokes around Heart"),
        Message::assistant("the heart is melting").with_name("comedian"),
        Message::user("what do studies say about MONDO:0005267?"),
    ]
}

#[tokio::test]
async fn test_persona_reply_is_attributed() {
    let provider = MockProvider::always("Why did the heart skip a beat?");
    let worker = PersonaWorker::new(Arc::new(provider.clone()), PersonaConfig::comedian());

    let history = history();
    let reply = worker.invoke(&history).await.unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.author(), Some("comedian"));
    assert_eq!(reply.content, "Why did the heart skip a beat?");

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0].content, "You are a comedian");
    assert_eq!(&request.messages[1..], &history[..]);
    assert!(request.choices.is_none());
}

#[tokio::test]
async fn test_persona_failure_names_worker() {
    let provider = MockProvider::new().with_failure("503 upstream");
    let worker = PersonaWorker::new(Arc::new(provider), PersonaConfig::comedian());

    let err = worker.invoke(&history()).await.unwrap_err();
    assert!(matches!(err, Error::AgentInvocation { ref worker, .. } if worker == "comedian"));
    assert!(err.to_string().contains("503 upstream"));
}

#[tokio::test]
async fn test_researcher_uses_latest_utterance_and_graph() {
    let provider = MockProvider::always("Framingham links heart failure to ...");
    let retriever = Arc::new(RecordingRetriever::default());
    let worker = ResearchWorker::new(Arc::new(provider.clone()), retriever.clone())
        .with_knowledge_graph(kg(heart_graph()));

    let reply = worker.invoke(&history()).await.unwrap();
    assert_eq!(reply.author(), Some("researcher"));

    assert_eq!(
        *retriever.queries.lock().unwrap(),
        vec!["what do studies say about MONDO:0005267?"]
    );

    let system = &provider.requests()[0].messages[0].content;
    assert!(system.contains("The Framingham study followed cardiac outcomes."));
    assert!(system.contains("Hidden concepts: congestive heart failure"));
    assert!(system.contains("Hidden relationships: Framingham Heart Study"));
}

#[tokio::test]
async fn test_researcher_survives_graph_outage() {
    let provider = MockProvider::always("answer without graph");
    let worker = ResearchWorker::new(
        Arc::new(provider.clone()),
        Arc::new(RecordingRetriever::default()),
    )
    .with_knowledge_graph(kg(DownStore));

    let reply = worker.invoke(&history()).await.unwrap();
    assert_eq!(reply.content, "answer without graph");
    let system = &provider.requests()[0].messages[0].content;
    assert!(!system.contains("Knowledge graph context"));
}

struct StalledStore;

#[async_trait]
impl GraphStore for StalledStore {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn query(&self, _pattern: &TwoHopPattern) -> sage_kg::Result<Vec<GraphRow>> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_researcher_bounds_the_graph_step() {
    let provider = MockProvider::always("answer without graph");
    let agent = Arc::new(KnowledgeGraphAgent::new(
        Arc::new(StalledStore),
        Arc::new(MemoryCache::new()),
        KnowledgeGraphConfig {
            query_timeout: Duration::from_secs(3600),
            ..KnowledgeGraphConfig::default()
        },
    ));
    let worker = ResearchWorker::new(
        Arc::new(provider.clone()),
        Arc::new(RecordingRetriever::default()),
    )
    .with_knowledge_graph(agent)
    .with_graph_timeout(Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    let reply = worker.invoke(&history()).await.unwrap();
    assert_eq!(reply.content, "answer without graph");
    assert!(started.elapsed() < Duration::from_secs(3));
    let system = &provider.requests()[0].messages[0].content;
    assert!(!system.contains("Knowledge graph context"));
}

#[tokio::test]
async fn test_researcher_retrieval_failure_is_agent_error() {
    let retriever = Arc::new(RecordingRetriever {
        fail: true,
        ..Default::default()
    });
    let provider = MockProvider::new();
    let worker = ResearchWorker::new(Arc::new(provider.clone()), retriever);

    let err = worker.invoke(&history()).await.unwrap_err();
    assert!(matches!(err, Error::AgentInvocation { ref worker, .. } if worker == "researcher"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_researcher_needs_a_user_message() {
    let worker = ResearchWorker::new(Arc::new(MockProvider::new()), Arc::new(NullRetriever));
    let err = worker
        .invoke(&[Message::assistant("hello").with_name("comedian")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no user utterance"));
}

#[tokio::test]
async fn test_null_retriever_adds_no_context() {
    let provider = MockProvider::new();
    let worker = ResearchWorker::new(Arc::new(provider.clone()), Arc::new(NullRetriever))
        .with_system_prompt("Answer briefly.");

    worker.invoke(&[Message::user("hi")]).await.unwrap();
    assert_eq!(provider.requests()[0].messages[0].content, "Answer briefly.");
}
