//! Worker agents
//!
//! A worker turns the conversation so far into exactly one new assistant
//! message attributed to its registered name. Workers read history, never
//! modify it.

mod persona;
mod research;
mod retriever;

#[cfg(test)]
mod tests;

pub use persona::{PersonaConfig, PersonaWorker};
pub use research::ResearchWorker;
pub use retriever::{HttpRetriever, NullRetriever, Retriever};

use crate::error::Result;
use async_trait::async_trait;
use sage_llm::Message;

/// A single-purpose responder
#[async_trait]
pub trait WorkerAgent: Send + Sync {
    /// Registered name; also the author of every message produced
    fn name(&self) -> &str;

    /// Produce one reply to `history`.
    ///
    /// # Errors
    /// Returns [`Error::AgentInvocation`](crate::Error::AgentInvocation)
    /// carrying the worker name.
    async fn invoke(&self, history: &[Message]) -> Result<Message>;
}
