use super::*;
use crate::checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
use crate::error::Error;
use crate::event_bus::{EventBus, GraphEvent};
use crate::intent::IntentClassifier;
use crate::intent_log::{LogSink, MemoryLog};
use crate::state::{ConversationState, Route, StateUpdate};
use crate::supervisor::{Roster, Supervisor, WorkerProfile};
use crate::utils::RetryConfig;
use crate::worker::WorkerAgent;
use async_trait::async_trait;
use sage_llm::{Message, MessageRole, MockProvider, MockReply};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Worker double answering "<name>: <latest user utterance>"
struct ScriptedWorker {
    name: String,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
    cancel_on_invoke: Option<CancellationToken>,
}

impl ScriptedWorker {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: Duration::ZERO,
            cancel_on_invoke: None,
        }
    }

    fn failing(name: &str, times: usize) -> Self {
        let worker = Self::new(name);
        worker.failures_left.store(times, Ordering::SeqCst);
        worker
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_invoke = Some(token);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerAgent for ScriptedWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, history: &[Message]) -> crate::Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(token) = &self.cancel_on_invoke {
            token.cancel();
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::agent(&self.name, "upstream returned 503"));
        }
        let query = history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(Message::assistant(format!("{}: {}", self.name, query)))
    }
}

fn supervisor(provider: &MockProvider) -> Supervisor {
    Supervisor::new(Arc::new(provider.clone()), Roster::reference()).with_retry(RetryConfig::none())
}

fn reference_graph(provider: &MockProvider) -> (GraphBuilder, Arc<ScriptedWorker>, Arc<ScriptedWorker>) {
    let comedian = Arc::new(ScriptedWorker::new("comedian"));
    let researcher = Arc::new(ScriptedWorker::new("researcher"));
    let builder = GraphBuilder::new()
        .with_worker(comedian.clone())
        .with_worker(researcher.clone())
        .with_supervisor(supervisor(provider));
    (builder, comedian, researcher)
}

#[tokio::test]
async fn test_reference_turn_routes_once_and_finishes() {
    let provider = MockProvider::always(r#"{"next":"comedian"}"#);
    let (builder, comedian, researcher) = reference_graph(&provider);
    let graph = builder.compile().unwrap();

    let state = graph
        .run("t1", StateUpdate::user("jokes around Heart"))
        .await
        .unwrap();

    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].author(), Some("comedian"));
    assert_eq!(state.messages[1].content, "comedian: jokes around Heart");
    assert_eq!(state.next, Some(Route::worker("comedian")));
    assert_eq!(comedian.calls(), 1);
    assert_eq!(researcher.calls(), 0);

    let checkpoint = graph.checkpoint("t1").await.unwrap().unwrap();
    assert!(checkpoint.is_finished());
    assert_eq!(checkpoint.step, 2);
    assert_eq!(checkpoint.turn_start, 0);
}

#[tokio::test]
async fn test_next_is_always_on_the_roster() {
    let provider = MockProvider::new()
        .with_reply("researcher")
        .with_reply("FINISH")
        .with_reply("poet");
    let (builder, _, _) = reference_graph(&provider);
    let graph = builder.with_worker_edge(WorkerEdge::Supervisor).compile().unwrap();

    let state = graph.run("t1", StateUpdate::user("q1")).await.unwrap();
    assert_eq!(state.next, Some(Route::Finish));

    let err = graph.run("t1", StateUpdate::user("q2")).await.unwrap_err();
    match &err {
        Error::Transition { node, source, .. } => {
            assert_eq!(node, "supervisor");
            assert!(matches!(**source, Error::RoutingDecision { ref raw, .. } if raw == "poet"));
        }
        other => panic!("unexpected error: {}", other),
    }

    // The unknown name never reached the state
    let stored = graph.state("t1").await.unwrap().unwrap();
    assert_eq!(stored.next, Some(Route::Finish));
    for next in stored.next.iter() {
        assert!(next.is_finish() || graph.worker_names().contains(&next.to_string()));
    }
}

#[tokio::test]
async fn test_history_only_grows() {
    let provider = MockProvider::new()
        .with_reply("comedian")
        .with_reply("researcher");
    let (builder, _, _) = reference_graph(&provider);
    let graph = builder.compile().unwrap();

    let first = graph.run("t1", StateUpdate::user("jokes around Heart")).await.unwrap();
    let second = graph.run("t1", StateUpdate::user("explain that more")).await.unwrap();

    assert_eq!(&second.messages[..first.messages.len()], &first.messages[..]);
    let authors: Vec<Option<&str>> = second.messages.iter().map(Message::author).collect();
    assert_eq!(authors, vec![None, Some("comedian"), None, Some("researcher")]);

    let checkpoint = graph.checkpoint("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.turn_start, 2);
}

#[tokio::test]
async fn test_loop_back_returns_to_supervisor() {
    let provider = MockProvider::new()
        .with_reply("researcher")
        .with_reply("comedian")
        .with_reply("FINISH");
    let (builder, comedian, researcher) = reference_graph(&provider);
    let graph = builder.with_worker_edge(WorkerEdge::Supervisor).compile().unwrap();

    let state = graph.run("t1", StateUpdate::user("q")).await.unwrap();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.next, Some(Route::Finish));
    assert_eq!((researcher.calls(), comedian.calls()), (1, 1));
    assert_eq!(provider.call_count(), 3);

    // The second decision saw the researcher's reply
    let second = &provider.requests()[1];
    assert!(second
        .messages
        .iter()
        .any(|m| m.author() == Some("researcher")));
}

#[tokio::test]
async fn test_static_edge_chains_workers() {
    let provider = MockProvider::always("comedian");
    let (builder, comedian, researcher) = reference_graph(&provider);
    let graph = builder
        .with_edge("comedian", Node::worker("researcher"))
        .compile()
        .unwrap();

    let state = graph.run("t1", StateUpdate::user("q")).await.unwrap();
    assert_eq!((comedian.calls(), researcher.calls()), (1, 1));
    assert_eq!(state.messages[2].author(), Some("researcher"));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_intent_node_records_codes() {
    let provider = MockProvider::always("comedian");
    let log = Arc::new(MemoryLog::new());
    let classifier = IntentClassifier::new(Arc::new(MockProvider::always("2,5")), log.clone());
    let (builder, _, _) = reference_graph(&provider);
    let graph = builder.with_intent_classifier(classifier).compile().unwrap();
    assert_eq!(graph.entry(), &Node::Intent);

    let state = graph.run("t1", StateUpdate::user("explain that more")).await.unwrap();
    assert_eq!(state.intents.unwrap().codes(), vec![2, 5]);
    assert_eq!(log.records().await.unwrap().len(), 1);

    // Intents are never shown to the supervisor
    let request = &provider.requests()[0];
    assert_eq!(request.messages[1].content, "explain that more");
    assert_eq!(request.messages.len(), 3);
}

#[tokio::test]
async fn test_classification_failure_is_not_fatal() {
    let provider = MockProvider::always("comedian");
    let log = Arc::new(MemoryLog::new());
    let classifier = IntentClassifier::new(
        Arc::new(MockProvider::always("Explanatory, Learning")),
        log.clone(),
    );
    let (builder, comedian, _) = reference_graph(&provider);
    let graph = builder.with_intent_classifier(classifier).compile().unwrap();

    let state = graph.run("t1", StateUpdate::user("explain that more")).await.unwrap();
    assert!(state.intents.unwrap().is_empty());
    assert_eq!(comedian.calls(), 1);
    assert!(log.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_failure_keeps_previous_checkpoint() {
    let provider = MockProvider::always("comedian");
    let comedian = Arc::new(ScriptedWorker::failing("comedian", usize::MAX));
    let graph = GraphBuilder::new()
        .with_worker(comedian.clone())
        .with_worker(Arc::new(ScriptedWorker::new("researcher")))
        .with_supervisor(supervisor(&provider))
        .compile()
        .unwrap();

    let first = graph
        .run("t1", StateUpdate::user("jokes around Heart"))
        .await
        .unwrap_err();
    assert!(matches!(
        first,
        Error::Transition { ref thread_id, ref node, .. } if thread_id == "t1" && node == "comedian"
    ));
    assert!(matches!(first.root(), Error::AgentInvocation { worker, .. } if worker == "comedian"));

    let checkpoint = graph.checkpoint("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.cursor, Node::worker("comedian"));
    assert_eq!(checkpoint.step, 1);
    assert_eq!(checkpoint.state.messages, vec![Message::user("jokes around Heart")]);

    let second = graph
        .run("t1", StateUpdate::user("jokes around Heart"))
        .await
        .unwrap_err();
    assert_eq!(first.to_string(), second.to_string());

    // The retried input replaced the interrupted one
    let checkpoint = graph.checkpoint("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.messages.len(), 1);
    assert_eq!(comedian.calls(), 2);
}

#[tokio::test]
async fn test_resume_after_crash_is_idempotent() {
    let provider = MockProvider::always("comedian");
    let comedian = Arc::new(ScriptedWorker::failing("comedian", 1));
    let graph = GraphBuilder::new()
        .with_worker(comedian.clone())
        .with_worker(Arc::new(ScriptedWorker::new("researcher")))
        .with_supervisor(supervisor(&provider))
        .compile()
        .unwrap();

    graph
        .run("t1", StateUpdate::user("jokes around Heart"))
        .await
        .unwrap_err();

    let resumed = graph.resume("t1", None).await.unwrap();
    // The routing decision was checkpointed and is not repeated
    assert_eq!(provider.call_count(), 1);
    assert_eq!(comedian.calls(), 2);

    // Same result as an uninterrupted run
    let clean_provider = MockProvider::always("comedian");
    let (builder, _, _) = reference_graph(&clean_provider);
    let clean = builder
        .compile()
        .unwrap()
        .run("t1", StateUpdate::user("jokes around Heart"))
        .await
        .unwrap();
    assert_eq!(resumed, clean);

    // Resuming a finished thread changes nothing
    let again = graph.resume("t1", None).await.unwrap();
    assert_eq!(again, resumed);
    assert_eq!(comedian.calls(), 2);
}

#[tokio::test]
async fn test_resume_from_saved_mid_turn_checkpoint() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let mut state = ConversationState::new("t1");
    state.apply(StateUpdate::user("what about MONDO:0005267?").with_next(Route::worker("researcher")));
    let mut checkpoint = Checkpoint::new(state, Node::worker("researcher"), 0);
    checkpoint.step = 1;
    store.save("t1", &checkpoint).await.unwrap();

    let provider = MockProvider::new();
    let (builder, _, researcher) = reference_graph(&provider);
    let graph = builder.with_checkpoint_store(store).compile().unwrap();

    let state = graph.resume("t1", None).await.unwrap();
    assert_eq!(researcher.calls(), 1);
    assert_eq!(provider.call_count(), 0);
    assert_eq!(state.messages[1].content, "researcher: what about MONDO:0005267?");
}

#[tokio::test]
async fn test_resume_unknown_thread() {
    let provider = MockProvider::new();
    let (builder, _, _) = reference_graph(&provider);
    let graph = builder.compile().unwrap();

    let err = graph.resume("nope", None).await.unwrap_err();
    assert!(matches!(err, Error::ThreadNotFound(ref id) if id == "nope"));
    assert!(graph.state("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_resume_finished_with_input_starts_turn() {
    let provider = MockProvider::new().with_reply("comedian").with_reply("researcher");
    let (builder, _, researcher) = reference_graph(&provider);
    let graph = builder.compile().unwrap();

    graph.run("t1", StateUpdate::user("joke")).await.unwrap();
    let state = graph
        .resume("t1", Some(StateUpdate::user("now a study")))
        .await
        .unwrap();
    assert_eq!(state.messages.len(), 4);
    assert_eq!(researcher.calls(), 1);
}

#[tokio::test]
async fn test_step_limit() {
    let provider = MockProvider::always("comedian");
    let (builder, comedian, _) = reference_graph(&provider);
    let graph = builder
        .with_config(GraphConfig {
            worker_edge: WorkerEdge::Supervisor,
            max_steps: 5,
            ..GraphConfig::default()
        })
        .compile()
        .unwrap();

    let err = graph.run("t1", StateUpdate::user("q")).await.unwrap_err();
    assert!(matches!(err, Error::StepLimitExceeded { max_steps: 5, .. }));
    assert_eq!(comedian.calls(), 2);

    let checkpoint = graph.checkpoint("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.step, 5);
    assert!(!checkpoint.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_one_turn_only() {
    let provider = MockProvider::new()
        .with_reply("comedian")
        .with_reply("comedian")
        .with_reply("FINISH")
        .with_reply("comedian")
        .with_reply("FINISH");
    let graph = Arc::new(
        GraphBuilder::new()
            .with_worker(Arc::new(
                ScriptedWorker::new("comedian").with_delay(Duration::from_secs(1)),
            ))
            .with_worker(Arc::new(ScriptedWorker::new("researcher")))
            .with_supervisor(supervisor(&provider))
            .with_worker_edge(WorkerEdge::Supervisor)
            .compile()
            .unwrap(),
    );
    assert!(!graph.cancel("t1"));

    let running = tokio::spawn({
        let graph = graph.clone();
        async move { graph.run("t1", StateUpdate::user("q")).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(graph.cancel("t1"));
    assert!(!graph.cancel("t2"));

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Cancelled { ref thread_id } if thread_id == "t1"));
    assert!(!graph.cancellation_token().is_cancelled());

    // Later turns on the same graph and thread run normally
    let state = graph.run("t1", StateUpdate::user("again")).await.unwrap();
    assert_eq!(state.last_message().unwrap().content, "comedian: again");
    assert_eq!(state.messages.len(), 2);
    let other = graph.run("t2", StateUpdate::user("q")).await.unwrap();
    assert_eq!(other.messages.len(), 2);
}

#[tokio::test]
async fn test_thread_bookkeeping_is_released() {
    let provider = MockProvider::always("comedian");
    let (builder, _, _) = reference_graph(&provider);
    let graph = Arc::new(builder.compile().unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let graph = graph.clone();
        handles.push(tokio::spawn(async move {
            graph
                .run(&format!("t{}", i % 3), StateUpdate::user("q"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    graph.resume("t0", None).await.unwrap();
    assert!(graph.resume("missing", None).await.is_err());

    assert!(graph.locks.is_empty());
    assert!(graph.turns.is_empty());
}

#[tokio::test]
async fn test_cancellation_between_transitions() {
    let token = CancellationToken::new();
    let provider = MockProvider::always("comedian");
    let comedian = Arc::new(ScriptedWorker::new("comedian").cancelling(token.clone()));
    let graph = GraphBuilder::new()
        .with_worker(comedian)
        .with_worker(Arc::new(ScriptedWorker::new("researcher")))
        .with_supervisor(supervisor(&provider))
        .with_worker_edge(WorkerEdge::Supervisor)
        .with_cancellation(token)
        .compile()
        .unwrap();

    let err = graph.run("t1", StateUpdate::user("q")).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { ref thread_id } if thread_id == "t1"));

    // The worker's transition completed and was kept
    let checkpoint = graph.checkpoint("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.cursor, Node::Supervisor);
    assert_eq!(checkpoint.state.messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_worker_times_out() {
    let provider = MockProvider::always("comedian");
    let graph = GraphBuilder::new()
        .with_worker(Arc::new(
            ScriptedWorker::new("comedian").with_delay(Duration::from_secs(120)),
        ))
        .with_worker(Arc::new(ScriptedWorker::new("researcher")))
        .with_supervisor(supervisor(&provider))
        .with_config(GraphConfig {
            call_timeout: Duration::from_secs(5),
            ..GraphConfig::default()
        })
        .compile()
        .unwrap();

    let err = graph.run("t1", StateUpdate::user("q")).await.unwrap_err();
    assert!(matches!(
        err.root(),
        Error::UpstreamTimeout { component, timeout_ms: 5000 } if component == "worker 'comedian'"
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_supervisor_timeout_is_wrapped() {
    let provider = MockProvider::new();
    provider.push(MockReply::Delayed(Duration::from_millis(200), "comedian".into()));
    let (_, comedian, researcher) = reference_graph(&provider);
    let graph = GraphBuilder::new()
        .with_worker(comedian)
        .with_worker(researcher)
        .with_supervisor(supervisor(&provider).with_timeout(Duration::from_millis(10)))
        .compile()
        .unwrap();

    let err = graph.run("t1", StateUpdate::user("q")).await.unwrap_err();
    assert!(matches!(err, Error::Transition { ref node, .. } if node == "supervisor"));
    assert!(matches!(err.root(), Error::UpstreamTimeout { .. }));
}

#[tokio::test]
async fn test_events_follow_transitions() {
    let provider = MockProvider::always("researcher");
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();
    let (builder, _, _) = reference_graph(&provider);
    let graph = builder.with_event_bus(bus).compile().unwrap();

    graph.run("t1", StateUpdate::user("q")).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let GraphEvent::NodeCompleted { ref node, ref next, .. } = event {
            kinds.push(format!("{}->{}", node, next));
        }
        let terminal = event.is_terminal();
        assert_eq!(event.thread_id(), "t1");
        if terminal {
            assert!(matches!(event, GraphEvent::RunCompleted { steps: 2, .. }));
        }
    }
    assert_eq!(kinds, vec!["supervisor->researcher", "researcher->FINISH"]);
}

#[tokio::test]
async fn test_same_thread_turns_do_not_interleave() {
    let provider = MockProvider::always("comedian");
    let graph = Arc::new(
        GraphBuilder::new()
            .with_worker(Arc::new(
                ScriptedWorker::new("comedian").with_delay(Duration::from_millis(5)),
            ))
            .with_worker(Arc::new(ScriptedWorker::new("researcher")))
            .with_supervisor(supervisor(&provider))
            .compile()
            .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..6 {
        let graph = graph.clone();
        handles.push(tokio::spawn(async move {
            graph.run("shared", StateUpdate::user(format!("q{}", i))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let state = graph.state("shared").await.unwrap().unwrap();
    assert_eq!(state.messages.len(), 12);
    for pair in state.messages.chunks(2) {
        assert_eq!(pair[0].role, MessageRole::User);
        assert_eq!(pair[1].content, format!("comedian: {}", pair[0].content));
    }
}

#[test]
fn test_compile_rejects_roster_mismatch() {
    let provider = MockProvider::new();

    let missing = GraphBuilder::new()
        .with_worker(Arc::new(ScriptedWorker::new("comedian")))
        .with_supervisor(supervisor(&provider))
        .compile();
    assert!(matches!(missing, Err(Error::InvalidGraph(ref m)) if m.contains("researcher")));

    let (builder, _, _) = reference_graph(&provider);
    let orphan = builder
        .with_worker(Arc::new(ScriptedWorker::new("poet")))
        .compile();
    assert!(matches!(orphan, Err(Error::InvalidGraph(ref m)) if m.contains("poet")));

    assert!(matches!(
        GraphBuilder::new().compile(),
        Err(Error::InvalidGraph(_))
    ));
}

#[test]
fn test_compile_rejects_bad_edges() {
    let provider = MockProvider::new();
    let build = |edges: Vec<(&str, Node)>| {
        let (mut builder, _, _) = reference_graph(&provider);
        for (from, to) in edges {
            builder = builder.with_edge(from, to);
        }
        builder.compile().map(|_| ())
    };

    assert!(build(vec![("comedian", Node::worker("poet"))]).is_err());
    assert!(build(vec![("poet", Node::Finish)]).is_err());
    assert!(build(vec![("comedian", Node::Intent)]).is_err());
    assert!(build(vec![
        ("comedian", Node::Finish),
        ("comedian", Node::Supervisor)
    ])
    .is_err());

    let cycle = build(vec![
        ("comedian", Node::worker("researcher")),
        ("researcher", Node::worker("comedian")),
    ]);
    assert!(matches!(cycle, Err(Error::InvalidGraph(ref m)) if m.contains("cycle")));
    assert!(build(vec![("comedian", Node::worker("comedian"))]).is_err());

    assert!(build(vec![
        ("comedian", Node::worker("researcher")),
        ("researcher", Node::Supervisor),
    ])
    .is_ok());
}

#[test]
fn test_compile_rejects_reserved_worker_name() {
    let provider = MockProvider::new();
    let roster = Roster::new(vec![WorkerProfile::new("poet", "Writes poems.")]).unwrap();
    let result = GraphBuilder::new()
        .with_worker(Arc::new(ScriptedWorker::new("poet")))
        .with_worker(Arc::new(ScriptedWorker::new("Supervisor")))
        .with_supervisor(Supervisor::new(Arc::new(provider), roster))
        .compile();
    assert!(matches!(result, Err(Error::InvalidGraph(ref m)) if m.contains("reserved")));
}

#[test]
fn test_topology_lists_every_edge() {
    let provider = MockProvider::new();
    let (builder, _, _) = reference_graph(&provider);
    let graph = builder
        .with_intent_classifier(IntentClassifier::new(
            Arc::new(MockProvider::new()),
            Arc::new(MemoryLog::new()),
        ))
        .with_edge("researcher", Node::Supervisor)
        .compile()
        .unwrap();

    let edges: Vec<String> = graph
        .topology()
        .into_iter()
        .map(|(from, to)| format!("{} -> {}", from, to))
        .collect();
    assert_eq!(
        edges,
        vec![
            "START -> intent",
            "intent -> supervisor",
            "supervisor -> comedian",
            "supervisor -> researcher",
            "supervisor -> FINISH",
            "comedian -> FINISH",
            "researcher -> supervisor",
        ]
    );
}

#[test]
fn test_node_serde_shape() {
    assert_eq!(
        serde_json::to_value(Node::worker("comedian")).unwrap(),
        serde_json::json!({"kind": "worker", "name": "comedian"})
    );
    assert_eq!(
        serde_json::to_value(Node::Supervisor).unwrap(),
        serde_json::json!({"kind": "supervisor"})
    );
    assert_eq!(
        serde_json::from_value::<WorkerEdge>(serde_json::json!("supervisor")).unwrap(),
        WorkerEdge::Supervisor
    );
}

/// Graph store whose queries never complete
struct StalledStore;

#[async_trait]
impl sage_kg::GraphStore for StalledStore {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn query(
        &self,
        _pattern: &sage_kg::TwoHopPattern,
    ) -> sage_kg::Result<Vec<sage_kg::GraphRow>> {
        std::future::pending().await
    }
}

/// Retriever that takes a second to answer
struct SlowRetriever;

#[async_trait]
impl crate::worker::Retriever for SlowRetriever {
    async fn retrieve(&self, _query: &str) -> crate::Result<String> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok("Framingham followed cardiac outcomes.".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_knowledge_graph_does_not_fail_the_turn() {
    let routing = MockProvider::always("researcher");
    let answers = MockProvider::always("answer from retrieved context");
    let agent = Arc::new(sage_kg::KnowledgeGraphAgent::new(
        Arc::new(StalledStore),
        Arc::new(sage_kg::MemoryCache::new()),
        sage_kg::KnowledgeGraphConfig::default(),
    ));
    let researcher =
        crate::worker::ResearchWorker::new(Arc::new(answers.clone()), Arc::new(SlowRetriever))
            .with_knowledge_graph(agent);
    let graph = GraphBuilder::new()
        .with_worker(Arc::new(ScriptedWorker::new("comedian")))
        .with_worker(Arc::new(researcher))
        .with_supervisor(supervisor(&routing))
        .compile()
        .unwrap();

    let state = graph
        .run("t", StateUpdate::user("what about MONDO:0005267?"))
        .await
        .unwrap();

    let reply = state.last_message().unwrap();
    assert_eq!(reply.author(), Some("researcher"));
    assert_eq!(reply.content, "answer from retrieved context");
    let system = &answers.requests()[0].messages[0].content;
    assert!(system.contains("Framingham followed cardiac outcomes."));
    assert!(!system.contains("Hidden"));
}
