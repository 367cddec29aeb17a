//! LLM Provider trait definition
//!
//! This module defines the core trait that all LLM providers must implement.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Whether `CompletionRequest::choices` is enforced by the backend.
    ///
    /// Callers validate the answer either way.
    fn supports_guided_choice(&self) -> bool {
        false
    }

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
