//! Utilities: bounded retry and call timeouts

pub mod retry;

pub use retry::{retry_with_backoff, RetryConfig, RetryError};

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Await `fut`, failing with [`Error::UpstreamTimeout`] after `timeout`.
pub async fn with_timeout<T, F>(component: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(component = %component, timeout_ms, "Upstream call timed out");
            Err(Error::UpstreamTimeout {
                component: component.to_string(),
                timeout_ms,
            })
        }
    }
}
