//! Turn execution: run, resume and checkpointing

use super::node::{GraphConfig, Node};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, GraphEvent};
use crate::intent::{IntentClassifier, IntentSet};
use crate::state::{ConversationState, Route, StateUpdate};
use crate::supervisor::Supervisor;
use crate::utils::with_timeout;
use crate::worker::WorkerAgent;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A compiled, runnable orchestration graph.
///
/// Built with [`GraphBuilder`](super::GraphBuilder). Calls on the same
/// thread id are serialized; distinct threads run concurrently. Per-thread
/// bookkeeping is dropped once no call for that thread is pending.
pub struct OrchestrationGraph {
    pub(crate) workers: HashMap<String, Arc<dyn WorkerAgent>>,
    pub(crate) order: Vec<String>,
    pub(crate) supervisor: Supervisor,
    pub(crate) classifier: Option<IntentClassifier>,
    pub(crate) edges: HashMap<String, Node>,
    pub(crate) entry: Node,
    pub(crate) checkpoints: Arc<dyn CheckpointStore>,
    pub(crate) event_bus: Option<Arc<EventBus>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) config: GraphConfig,
    pub(crate) locks: DashMap<String, Arc<Mutex<()>>>,
    pub(crate) turns: DashMap<String, CancellationToken>,
}

/// Prunes the thread's lock entry when the last pending call ends
struct ThreadSlot<'a> {
    graph: &'a OrchestrationGraph,
    thread_id: &'a str,
}

impl Drop for ThreadSlot<'_> {
    fn drop(&mut self) {
        self.graph
            .locks
            .remove_if(self.thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Registers the turn's cancellation token while the thread lock is held
struct ActiveTurn<'a> {
    graph: &'a OrchestrationGraph,
    thread_id: &'a str,
    token: CancellationToken,
}

impl<'a> ActiveTurn<'a> {
    fn begin(graph: &'a OrchestrationGraph, thread_id: &'a str) -> Self {
        let token = graph.cancel.child_token();
        graph.turns.insert(thread_id.to_string(), token.clone());
        Self {
            graph,
            thread_id,
            token,
        }
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        self.graph.turns.remove(self.thread_id);
    }
}

impl OrchestrationGraph {
    /// First node of every turn
    #[must_use]
    pub fn entry(&self) -> &Node {
        &self.entry
    }

    /// Registered workers in registration order
    #[must_use]
    pub fn worker_names(&self) -> &[String] {
        &self.order
    }

    /// Limits in effect
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Backing checkpoint store
    #[must_use]
    pub fn checkpoint_store(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// Event bus, if one was attached
    #[must_use]
    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }

    /// Graph-wide shutdown token. Cancelling it stops every in-flight turn
    /// and every later one; use [`cancel`](Self::cancel) to stop a single turn.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the turn running on `thread_id` at its next transition.
    ///
    /// Returns `false` if no turn is running there. Later calls on the thread
    /// are unaffected.
    pub fn cancel(&self, thread_id: &str) -> bool {
        match self.turns.get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Every edge as `(from, to)`, starting with `START`
    #[must_use]
    pub fn topology(&self) -> Vec<(String, String)> {
        let mut edges = vec![("START".to_string(), self.entry.to_string())];
        if self.classifier.is_some() {
            edges.push((Node::Intent.to_string(), Node::Supervisor.to_string()));
        }
        for name in &self.order {
            edges.push((Node::Supervisor.to_string(), name.clone()));
        }
        edges.push((Node::Supervisor.to_string(), Node::Finish.to_string()));
        for name in &self.order {
            let to = self
                .edges
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.config.worker_edge.target());
            edges.push((name.clone(), to.to_string()));
        }
        edges
    }

    /// Latest checkpointed state of a thread
    ///
    /// # Errors
    /// Returns error if the checkpoint store fails
    pub async fn state(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.checkpoints.load(thread_id).await?.map(|cp| cp.state))
    }

    /// Latest checkpoint of a thread, including the cursor
    ///
    /// # Errors
    /// Returns error if the checkpoint store fails
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        self.checkpoints.load(thread_id).await
    }

    /// Start a new turn on `thread_id` with `input` and drive it to FINISH.
    ///
    /// An interrupted turn left in the store is rolled back to its start
    /// first, so repeating a failed call starts from the same state.
    ///
    /// # Errors
    /// Returns [`Error::Transition`] if a node fails, [`Error::Cancelled`],
    /// [`Error::StepLimitExceeded`], or a checkpoint error.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn run(&self, thread_id: &str, input: StateUpdate) -> Result<ConversationState> {
        let _slot = ThreadSlot {
            graph: self,
            thread_id,
        };
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;
        let turn = ActiveTurn::begin(self, thread_id);

        let base = match self.checkpoints.load(thread_id).await? {
            Some(cp) if !cp.is_finished() => {
                warn!(
                    cursor = %cp.cursor,
                    dropped = cp.state.messages.len().saturating_sub(cp.turn_start),
                    "Rolling back interrupted turn"
                );
                let mut state = cp.state;
                state.messages.truncate(cp.turn_start);
                state
            }
            Some(cp) => cp.state,
            None => ConversationState::new(thread_id),
        };

        self.start_turn(thread_id, base, input, &turn.token).await
    }

    /// Continue a thread from its last checkpoint.
    ///
    /// Mid-turn, `input` is merged and execution continues at the saved
    /// cursor. On a finished thread, `input` starts a new turn and `None`
    /// returns the state unchanged.
    ///
    /// # Errors
    /// Returns [`Error::ThreadNotFound`] if the thread has no checkpoint,
    /// otherwise the same errors as [`run`](Self::run).
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn resume(
        &self,
        thread_id: &str,
        input: Option<StateUpdate>,
    ) -> Result<ConversationState> {
        let _slot = ThreadSlot {
            graph: self,
            thread_id,
        };
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;
        let turn = ActiveTurn::begin(self, thread_id);

        let mut checkpoint = self
            .checkpoints
            .load(thread_id)
            .await?
            .ok_or_else(|| Error::ThreadNotFound(thread_id.to_string()))?;

        if checkpoint.is_finished() {
            return match input {
                Some(input) => {
                    self.start_turn(thread_id, checkpoint.state, input, &turn.token)
                        .await
                }
                None => {
                    debug!("Thread already finished; nothing to resume");
                    Ok(checkpoint.state)
                }
            };
        }

        info!(cursor = %checkpoint.cursor, step = checkpoint.step, "Resuming interrupted turn");
        if let Some(input) = input.filter(|u| !u.is_empty()) {
            checkpoint.state.apply(input);
            checkpoint.updated_at = Utc::now();
            self.checkpoints.save(thread_id, &checkpoint).await?;
        }
        self.drive(checkpoint, &turn.token).await
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn start_turn(
        &self,
        thread_id: &str,
        mut state: ConversationState,
        input: StateUpdate,
        cancel: &CancellationToken,
    ) -> Result<ConversationState> {
        let turn_start = state.messages.len();
        state.apply(input);
        let checkpoint = Checkpoint::new(state, self.entry.clone(), turn_start);
        self.checkpoints.save(thread_id, &checkpoint).await?;
        self.drive(checkpoint, cancel).await
    }

    /// Execute transitions until FINISH, saving after each one
    async fn drive(
        &self,
        mut checkpoint: Checkpoint,
        cancel: &CancellationToken,
    ) -> Result<ConversationState> {
        let run_id = Uuid::new_v4();
        let thread_id = checkpoint.state.thread_id.clone();
        self.publish(GraphEvent::RunStarted {
            run_id,
            thread_id: thread_id.clone(),
            node: checkpoint.cursor.to_string(),
        });

        loop {
            if checkpoint.is_finished() {
                info!(
                    thread_id = %thread_id,
                    steps = checkpoint.step,
                    messages = checkpoint.state.messages.len(),
                    "Turn finished"
                );
                self.publish(GraphEvent::RunCompleted {
                    run_id,
                    thread_id,
                    steps: checkpoint.step,
                });
                return Ok(checkpoint.state);
            }

            if cancel.is_cancelled() {
                warn!(thread_id = %thread_id, cursor = %checkpoint.cursor, "Turn cancelled");
                self.publish(GraphEvent::RunCancelled {
                    run_id,
                    thread_id: thread_id.clone(),
                });
                return Err(Error::Cancelled { thread_id });
            }

            if checkpoint.step >= self.config.max_steps {
                let err = Error::StepLimitExceeded {
                    thread_id: thread_id.clone(),
                    max_steps: self.config.max_steps,
                };
                return Err(self.fail(run_id, err));
            }

            let node = checkpoint.cursor.clone();
            let step = checkpoint.step + 1;
            self.publish(GraphEvent::NodeStarted {
                run_id,
                thread_id: thread_id.clone(),
                node: node.to_string(),
                step,
            });

            let (update, next) = match self.execute(&node, &checkpoint.state).await {
                Ok(outcome) => outcome,
                Err(source) => {
                    let err = Error::Transition {
                        thread_id: thread_id.clone(),
                        node: node.to_string(),
                        source: Box::new(source),
                    };
                    return Err(self.fail(run_id, err));
                }
            };

            let output = update.messages.last().map(|m| m.content.clone());
            let mut advanced = checkpoint.clone();
            advanced.state.apply(update);
            advanced.cursor = next;
            advanced.step = step;
            advanced.updated_at = Utc::now();

            if let Err(source) = self.checkpoints.save(&thread_id, &advanced).await {
                let err = Error::Transition {
                    thread_id: thread_id.clone(),
                    node: node.to_string(),
                    source: Box::new(source),
                };
                return Err(self.fail(run_id, err));
            }

            debug!(
                thread_id = %thread_id,
                node = %node,
                next = %advanced.cursor,
                step,
                "Transition completed"
            );
            self.publish(GraphEvent::NodeCompleted {
                run_id,
                thread_id: thread_id.clone(),
                node: node.to_string(),
                step,
                next: advanced.cursor.to_string(),
                output,
            });
            checkpoint = advanced;
        }
    }

    /// Run one node against the current state
    async fn execute(&self, node: &Node, state: &ConversationState) -> Result<(StateUpdate, Node)> {
        match node {
            Node::Intent => {
                let intents = self.classify(state).await;
                Ok((StateUpdate::default().with_intents(intents), Node::Supervisor))
            }
            Node::Supervisor => {
                let route = self.supervisor.decide(&state.messages).await?;
                let next = match &route {
                    Route::Finish => Node::Finish,
                    Route::Worker(name) if self.workers.contains_key(name) => {
                        Node::worker(name.as_str())
                    }
                    Route::Worker(name) => {
                        let mut allowed = vec![Route::Finish.to_string()];
                        allowed.extend(self.order.iter().cloned());
                        return Err(Error::RoutingDecision {
                            raw: name.clone(),
                            allowed,
                        });
                    }
                };
                Ok((StateUpdate::default().with_next(route), next))
            }
            Node::Worker(name) => {
                let worker = self.workers.get(name).ok_or_else(|| {
                    Error::InvalidGraph(format!("worker '{}' is not registered", name))
                })?;
                let component = format!("worker '{}'", name);
                let mut reply = with_timeout(
                    &component,
                    self.config.call_timeout,
                    worker.invoke(&state.messages),
                )
                .await?;
                if reply.author() != Some(name.as_str()) {
                    reply = reply.with_name(name.as_str());
                }
                let next = self
                    .edges
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| self.config.worker_edge.target());
                Ok((StateUpdate::message(reply), next))
            }
            Node::Finish => Ok((StateUpdate::default(), Node::Finish)),
        }
    }

    /// Classification never fails the turn
    async fn classify(&self, state: &ConversationState) -> IntentSet {
        let (Some(classifier), Some(query)) = (&self.classifier, state.latest_user_utterance())
        else {
            return IntentSet::new();
        };
        match classifier.classify(query).await {
            Ok(intents) => intents,
            Err(e) => {
                warn!(error = %e, "Intent classification failed; continuing without intents");
                IntentSet::new()
            }
        }
    }

    fn fail(&self, run_id: Uuid, err: Error) -> Error {
        let thread_id = match &err {
            Error::Transition { thread_id, .. }
            | Error::StepLimitExceeded { thread_id, .. }
            | Error::Cancelled { thread_id } => thread_id.clone(),
            _ => String::new(),
        };
        warn!(thread_id = %thread_id, error = %err, "Turn aborted");
        self.publish(GraphEvent::RunFailed {
            run_id,
            thread_id,
            error: err.to_string(),
        });
        err
    }

    fn publish(&self, event: GraphEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
