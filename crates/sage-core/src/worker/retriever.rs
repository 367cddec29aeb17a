//! Retrieval boundary used by the researcher

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Document / vector retrieval chain
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Context text relevant to `query` (may be empty)
    async fn retrieve(&self, query: &str) -> Result<String>;
}

/// Retriever that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRetriever;

#[async_trait]
impl Retriever for NullRetriever {
    async fn retrieve(&self, _query: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    context: String,
}

/// Retriever behind an HTTP endpoint.
///
/// POSTs `{"query": ...}` and reads `{"context": ...}`; a non-JSON body is
/// taken verbatim as the context.
pub struct HttpRetriever {
    client: Client,
    endpoint: String,
}

impl HttpRetriever {
    /// Create a retriever for `endpoint`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Retrieval(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RetrieveRequest { query })
            .send()
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Retrieval(format!(
                "{} returned {}: {}",
                self.endpoint,
                status,
                sage_llm::util::truncate_safe(&body, 200)
            )));
        }

        let context = match serde_json::from_str::<RetrieveResponse>(&body) {
            Ok(parsed) => parsed.context,
            Err(_) => body,
        };
        debug!(endpoint = %self.endpoint, chars = context.len(), "Context retrieved");
        Ok(context)
    }
}
