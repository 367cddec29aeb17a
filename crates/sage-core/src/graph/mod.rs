//! Orchestration graph
//!
//! An explicit state machine over [`ConversationState`](crate::ConversationState):
//!
//! ```text
//! START ─► [intent] ─► supervisor ─┬─► worker ─► FINISH | supervisor | worker
//!                                  └─► FINISH
//! ```
//!
//! Every completed transition is checkpointed, so a crashed or failed turn
//! can be resumed from the last good position.

mod builder;
mod node;
mod runner;

#[cfg(test)]
mod tests;

pub use builder::GraphBuilder;
pub use node::{GraphConfig, Node, WorkerEdge};
pub use runner::OrchestrationGraph;
