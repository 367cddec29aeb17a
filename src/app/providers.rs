//! LLM provider resolution

use super::config::LlmConfig;
use anyhow::{bail, Context, Result};
use sage_llm::{LlmProvider, OllamaConfig, OllamaProvider, OpenAiCompatConfig, OpenAiCompatProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the configured provider
pub fn resolve_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider.as_str() {
        "openai_compat" | "vllm" | "openai" => {
            let mut provider_config = match &config.base_url {
                Some(url) => OpenAiCompatConfig::new(url),
                None => OpenAiCompatConfig::default(),
            }
            .with_guided_mode(config.guided_mode)
            .with_timeout(timeout);
            if let Some(model) = &config.model {
                provider_config = provider_config.with_model(model);
            }
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            if let Some(key) = api_key {
                provider_config = provider_config.with_api_key(key);
            }
            let provider = OpenAiCompatProvider::new(provider_config)
                .context("Failed to create OpenAI-compatible provider")?;
            info!(guided_mode = ?config.guided_mode, "Registered OpenAI-compatible provider");
            Ok(Arc::new(provider))
        }
        "ollama" => {
            let mut provider_config = OllamaConfig::new().with_timeout(timeout);
            if let Some(url) = &config.base_url {
                provider_config = provider_config.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider_config = provider_config.with_model(model);
            }
            let provider =
                OllamaProvider::new(provider_config).context("Failed to create Ollama provider")?;
            info!("Registered Ollama provider");
            Ok(Arc::new(provider))
        }
        other => bail!(
            "Unknown LLM provider '{}'. Use 'openai_compat' or 'ollama'.",
            other
        ),
    }
}
