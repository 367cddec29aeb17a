//! Completion request and response types
//!
//! A request may carry an enumeration constraint (`choices`). Providers must
//! translate it into whatever guided-decoding mechanism the backend offers;
//! callers still validate the returned text against the same enumeration.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model to use (provider-specific, empty = provider default)
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Restrict the answer to exactly one of these values.
    ///
    /// Backends answer with a JSON object `{"next": "<choice>"}`.
    pub choices: Option<Vec<String>>,
}

impl CompletionRequest {
    /// Create a new completion request
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add messages
    #[must_use]
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Constrain the output to one of `choices`
    #[must_use]
    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = Some(choices);
        self
    }

    /// JSON schema describing the constrained answer, if any
    #[must_use]
    pub fn choice_schema(&self) -> Option<serde_json::Value> {
        self.choices.as_ref().map(|choices| {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "next": {
                        "title": "Next",
                        "enum": choices,
                    }
                },
                "required": ["next"],
            })
        })
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Token usage
    pub usage: Option<TokenUsage>,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Model used
    pub model: String,
}

impl CompletionResponse {
    /// Plain text response with no usage metadata
    #[must_use]
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            finish_reason: Some("stop".to_string()),
            model: model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("llama3.1-8b")
            .with_message(Message::system("You are a comedian"))
            .with_message(Message::user("jokes around heart"))
            .with_max_tokens(100)
            .with_temperature(0.7);

        assert_eq!(request.model, "llama3.1-8b");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.max_tokens, Some(100));
        assert_eq!(request.temperature, Some(0.7));
        assert!(request.choices.is_none());
        assert!(request.choice_schema().is_none());
    }

    #[test]
    fn test_choice_schema() {
        let request = CompletionRequest::new("m").with_choices(vec![
            "FINISH".to_string(),
            "comedian".to_string(),
            "researcher".to_string(),
        ]);

        let schema = request.choice_schema().unwrap();
        assert_eq!(schema["required"][0], "next");
        assert_eq!(
            schema["properties"]["next"]["enum"],
            serde_json::json!(["FINISH", "comedian", "researcher"])
        );
    }
}
