//! Sage Core - Orchestration Engine
//!
//! This crate provides the supervisor-routed conversation core for Sage,
//! including:
//! - State: Conversation state and the merge rule
//! - Workers: Persona and research workers behind one trait
//! - Supervisor: Constrained routing over the worker roster
//! - Intent: Query classification with an append-only log
//! - Graph: The orchestration state machine with checkpoint/resume
//! - Checkpoint: Memory, SQLite and Redis checkpoint stores
//! - Utils: Retry and timeout helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod error;
pub mod event_bus;
pub mod graph;
pub mod intent;
pub mod intent_log;
pub mod state;
pub mod supervisor;
pub mod utils;
pub mod worker;

pub use checkpoint::{
    Checkpoint, CheckpointBackendConfig, CheckpointStore, MemoryCheckpointStore,
    RedisCheckpointStore, SqliteCheckpointStore,
};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use event_bus::{EventBus, GraphEvent};
pub use graph::{GraphBuilder, GraphConfig, Node, OrchestrationGraph, WorkerEdge};
pub use intent::{classifier_prompt, parse_intents, IntentCategory, IntentClassifier, IntentSet};
pub use intent_log::{IntentRecord, JsonFileLog, LogSink, MemoryLog};
pub use state::{ConversationState, Route, StateUpdate, FINISH};
pub use supervisor::{parse_route, Roster, Supervisor, WorkerProfile};
pub use utils::{retry_with_backoff, with_timeout, RetryConfig};
pub use worker::{
    HttpRetriever, NullRetriever, PersonaConfig, PersonaWorker, ResearchWorker, Retriever,
    WorkerAgent,
};
