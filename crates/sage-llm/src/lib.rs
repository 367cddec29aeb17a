//! Sage LLM - Model-call boundary
//!
//! This crate provides the language-model boundary used by the Sage core:
//! - Message: role-tagged conversation entries with author names
//! - Completion: requests that may constrain output to a fixed enumeration
//! - Provider: the `LlmProvider` trait every backend implements
//! - OpenAI-compatible: vLLM / OpenAI chat completions (guided decoding)
//! - Ollama: local Ollama provider (JSON-schema constrained output)
//! - Mock: scripted provider for tests and offline demos

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod util;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::{MockProvider, MockReply};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai_compat::{GuidedMode, OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::LlmProvider;
