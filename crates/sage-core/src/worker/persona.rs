use super::WorkerAgent;
use crate::error::{Error, Result};
use async_trait::async_trait;
use sage_llm::{CompletionRequest, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Fixed-prompt persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Registered name
    pub name: String,
    /// System prompt placed before the history
    pub system_prompt: String,
    /// Model override
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl PersonaConfig {
    /// Persona with a name and a system prompt
    #[must_use]
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            model: None,
            temperature: None,
        }
    }

    /// The comedian
    #[must_use]
    pub fn comedian() -> Self {
        Self::new("comedian", "You are a comedian")
    }
}

/// Worker that answers in a fixed persona: system prompt + full history
pub struct PersonaWorker {
    provider: Arc<dyn LlmProvider>,
    config: PersonaConfig,
}

impl PersonaWorker {
    /// Create a persona worker
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: PersonaConfig) -> Self {
        Self { provider, config }
    }

    /// Persona configuration
    #[must_use]
    pub fn config(&self) -> &PersonaConfig {
        &self.config
    }
}

#[async_trait]
impl WorkerAgent for PersonaWorker {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn invoke(&self, history: &[Message]) -> Result<Message> {
        let model = self
            .config
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        let mut request = CompletionRequest::new(model)
            .with_message(Message::system(self.config.system_prompt.clone()))
            .with_messages(history.iter().cloned());
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::agent(&self.config.name, e))?;

        debug!(worker = %self.config.name, chars = response.content.len(), "Persona replied");
        Ok(Message::assistant(response.content).with_name(&self.config.name))
    }
}
