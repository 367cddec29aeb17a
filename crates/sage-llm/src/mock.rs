//! Mock LLM Provider for testing
//!
//! Replies are served from a FIFO script; once the script is exhausted the
//! provider answers with a fixed default. Every request is recorded so tests
//! can assert on the prompts that were sent.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with this text
    Text(String),
    /// Fail with an API error carrying this message
    Fail(String),
    /// Sleep, then answer with this text
    Delayed(Duration, String),
}

/// A mock LLM provider that returns queued replies or a default one.
#[derive(Clone)]
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    default_reply: String,
    guided: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_reply: "mock response".to_string(),
            guided: true,
        }
    }

    /// Create a provider that answers every request with `reply`.
    #[must_use]
    pub fn always(reply: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.default_reply = reply.into();
        provider
    }

    /// Queue a text reply.
    #[must_use]
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(MockReply::Text(reply.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(MockReply::Fail(message.into()));
        self
    }

    /// Mark the provider as not enforcing `choices`.
    #[must_use]
    pub fn unguided(mut self) -> Self {
        self.guided = false;
        self
    }

    /// Add a reply to the queue.
    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn supports_guided_choice(&self) -> bool {
        self.guided
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(MockReply::Text(text)) => Ok(CompletionResponse::text("mock-model", text)),
            Some(MockReply::Fail(message)) => Err(Error::Api(message)),
            Some(MockReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(CompletionResponse::text("mock-model", text))
            }
            None => Ok(CompletionResponse::text(
                "mock-model",
                self.default_reply.clone(),
            )),
        }
    }
}
