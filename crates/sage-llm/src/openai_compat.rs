//! OpenAI-compatible chat completions provider
//!
//! Talks to any server exposing `/v1/chat/completions`: OpenAI itself, vLLM,
//! llama.cpp server, LiteLLM. Enumeration constraints are sent either as
//! vLLM `guided_json` or as an OpenAI `response_format` JSON schema.

use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::LlmProvider;
use crate::util::{mask_api_key, sanitize_api_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default model (vLLM-served Llama 3.1 8B)
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// How an enumeration constraint is sent to the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidedMode {
    /// vLLM extension: `guided_json` request field
    #[default]
    VllmGuidedJson,
    /// OpenAI structured outputs: `response_format.json_schema`
    JsonSchema,
    /// Do not constrain; rely on caller-side validation only
    Off,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guided_json: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Configuration for the OpenAI-compatible provider
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// API key ("EMPTY" for unauthenticated vLLM servers)
    pub api_key: String,
    /// Base URL including the `/v1` suffix
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Constraint encoding
    pub guided_mode: GuidedMode,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("guided_mode", &self.guided_mode)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key: "EMPTY".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            guided_mode: GuidedMode::VllmGuidedJson,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiCompatConfig {
    /// Create a configuration pointing at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the constraint encoding
    #[must_use]
    pub fn with_guided_mode(mut self, mode: GuidedMode) -> Self {
        self.guided_mode = mode;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create a new provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        debug!(config = ?config, "OpenAI-compatible provider created");
        Ok(Self { client, config })
    }

    fn convert_message(msg: &Message) -> ChatMessage {
        ChatMessage {
            role: msg.role.as_str(),
            content: msg.content.clone(),
            name: msg.name.clone(),
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        let schema = request.choice_schema();
        let (guided_json, response_format) = match (self.config.guided_mode, schema) {
            (GuidedMode::VllmGuidedJson, Some(schema)) => (Some(schema), None),
            (GuidedMode::JsonSchema, Some(schema)) => (
                None,
                Some(serde_json::json!({
                    "type": "json_schema",
                    "json_schema": { "name": "route", "schema": schema, "strict": true }
                })),
            ),
            _ => (None, None),
        };

        ChatRequest {
            model,
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            guided_json,
            response_format,
        }
    }

    async fn send_request(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit);
        }

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                return Err(Error::Api(sanitize_api_error(&err.error.message)));
            }
            return Err(Error::Api(sanitize_api_error(&format!("HTTP {}", status))));
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compat"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    fn supports_guided_choice(&self) -> bool {
        self.config.guided_mode != GuidedMode::Off
    }

    #[instrument(skip(self, request), fields(model = %request.model, constrained = request.choices.is_some()))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let chat_request = self.build_request(&request);
        let response = self.send_request(chat_request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
            model: response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(mode: GuidedMode) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(OpenAiCompatConfig::default().with_guided_mode(mode)).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = OpenAiCompatConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.guided_mode, GuidedMode::VllmGuidedJson);
        assert!(!format!("{:?}", config.with_api_key("sk-1234567890abcdef")).contains("567890"));
    }

    #[test]
    fn test_guided_json_request() {
        let request = CompletionRequest::new("")
            .with_message(Message::user("hi"))
            .with_choices(vec!["FINISH".to_string(), "comedian".to_string()]);

        let body = serde_json::to_value(provider(GuidedMode::VllmGuidedJson).build_request(&request))
            .unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(
            body["guided_json"]["properties"]["next"]["enum"],
            serde_json::json!(["FINISH", "comedian"])
        );
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_json_schema_request() {
        let request = CompletionRequest::new("gpt-4o-mini").with_choices(vec!["FINISH".into()]);
        let body =
            serde_json::to_value(provider(GuidedMode::JsonSchema).build_request(&request)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert!(body.get("guided_json").is_none());
    }

    #[test]
    fn test_unconstrained_request_and_names() {
        let request = CompletionRequest::new("")
            .with_message(Message::assistant("ha").with_name("comedian"));
        let body =
            serde_json::to_value(provider(GuidedMode::VllmGuidedJson).build_request(&request))
                .unwrap();
        assert!(body.get("guided_json").is_none());
        assert_eq!(body["messages"][0]["name"], "comedian");
        assert!(!provider(GuidedMode::Off).supports_guided_choice());
    }
}
