//! Supervisor policy
//!
//! Picks the next worker (or FINISH) from the full conversation. The model
//! call carries a hard enumeration constraint, and the reply is validated
//! against the same enumeration: anything outside it is an error, never a
//! fuzzy match and never a silent FINISH.

use crate::error::{Error, Result};
use crate::state::{Route, FINISH};
use crate::utils::{retry_with_backoff, with_timeout, RetryConfig};
use sage_llm::{CompletionRequest, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[cfg(test)]
mod tests;

/// Names no worker may take
pub const RESERVED_NAMES: [&str; 3] = [FINISH, "supervisor", "intent"];

/// A worker as the supervisor sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerProfile {
    /// Registered name
    pub name: String,
    /// Competence description shown to the supervisor
    pub description: String,
}

impl WorkerProfile {
    /// Create a profile
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// The set of workers the supervisor may route to, in prompt order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    profiles: Vec<WorkerProfile>,
}

impl Roster {
    /// Validate and build a roster.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGraph`] for an empty roster, an empty,
    /// reserved or repeated name.
    pub fn new(profiles: Vec<WorkerProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(Error::InvalidGraph("roster has no workers".to_string()));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let name = profile.name.as_str();
            if name.trim().is_empty() {
                return Err(Error::InvalidGraph("worker name is empty".to_string()));
            }
            if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                return Err(Error::InvalidGraph(format!(
                    "worker name '{}' is reserved",
                    name
                )));
            }
            if seen.contains(&name) {
                return Err(Error::InvalidGraph(format!(
                    "worker '{}' is listed twice",
                    name
                )));
            }
            seen.push(name);
        }
        Ok(Self { profiles })
    }

    /// The comedian / researcher pair
    #[must_use]
    pub fn reference() -> Self {
        Self {
            profiles: vec![
                WorkerProfile::new(
                    "comedian",
                    "The comedian is responsible for telling you jokes but is not good for telling you facts.",
                ),
                WorkerProfile::new(
                    "researcher",
                    "The researcher is responsible for looking up studies and giving you answers and is not good for telling jokes.",
                ),
            ],
        }
    }

    /// Worker names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// Profiles in order
    #[must_use]
    pub fn profiles(&self) -> &[WorkerProfile] {
        &self.profiles
    }

    /// True if `name` is on the roster
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    /// `FINISH` followed by every worker name
    #[must_use]
    pub fn options(&self) -> Vec<String> {
        std::iter::once(FINISH.to_string())
            .chain(self.names().map(str::to_string))
            .collect()
    }

    /// Map an option string onto a route, failing closed
    ///
    /// # Errors
    /// Returns [`Error::RoutingDecision`] if `choice` is not an option
    pub fn resolve(&self, choice: &str, raw: &str) -> Result<Route> {
        if choice == FINISH {
            return Ok(Route::Finish);
        }
        if self.contains(choice) {
            return Ok(Route::worker(choice));
        }
        Err(Error::RoutingDecision {
            raw: raw.to_string(),
            allowed: self.options(),
        })
    }
}

/// Parse a supervisor reply.
///
/// Accepts exactly `{"next": "<option>"}`, a JSON string `"<option>"`, or the
/// bare option text.
///
/// # Errors
/// Returns [`Error::RoutingDecision`] for any other shape or an unknown option.
pub fn parse_route(raw: &str, roster: &Roster) -> Result<Route> {
    let reject = || Error::RoutingDecision {
        raw: raw.to_string(),
        allowed: roster.options(),
    };

    let trimmed = raw.trim();
    let choice = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("next") {
            Some(serde_json::Value::String(s)) if map.len() == 1 => s.trim().to_string(),
            _ => return Err(reject()),
        },
        Ok(serde_json::Value::String(s)) => s.trim().to_string(),
        Ok(_) => return Err(reject()),
        Err(_) => trimmed.to_string(),
    };

    roster.resolve(&choice, raw)
}

/// Render the opening system prompt
#[must_use]
pub fn system_prompt(roster: &Roster) -> String {
    let members: Vec<&str> = roster.names().collect();
    let mut prompt = format!(
        "You are a supervisor tasked with managing a conversation between the following workers: {}.",
        members.join(", ")
    );
    for profile in roster.profiles() {
        prompt.push(' ');
        prompt.push_str(profile.description.trim());
    }
    prompt.push_str(
        " Your task is to respond with the name of the worker that should perform the task next. \
         Once the task is completed review it for further action, and respond with the next \
         member to call or FINISH to mark it as done.",
    );
    prompt
}

/// Render the closing instruction listing the options
#[must_use]
pub fn closing_prompt(roster: &Roster) -> String {
    let options: Vec<String> = roster
        .options()
        .iter()
        .map(|o| format!("'{}'", o))
        .collect();
    format!(
        "Given the conversation above, which member should act next? \
         Or should we FINISH? Select one of: [{}]",
        options.join(", ")
    )
}

/// LLM-backed routing policy
pub struct Supervisor {
    provider: Arc<dyn LlmProvider>,
    roster: Roster,
    model: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
    choices_enforced: bool,
}

impl Supervisor {
    /// Create a supervisor over `roster`
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, roster: Roster) -> Self {
        let choices_enforced = provider.supports_guided_choice();
        if !choices_enforced {
            warn!(
                provider = %provider.name(),
                "Provider cannot constrain routing answers; replies outside the roster will be retried"
            );
        }
        Self {
            provider,
            roster,
            model: None,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            choices_enforced,
        }
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry policy for unusable answers and timeouts
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Workers this supervisor routes to
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Whether the backend enforces the option list on its own
    #[must_use]
    pub fn choices_enforced(&self) -> bool {
        self.choices_enforced
    }

    /// Build the constrained request for `history`
    #[must_use]
    pub fn build_request(&self, history: &[Message]) -> CompletionRequest {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        CompletionRequest::new(model)
            .with_message(Message::system(system_prompt(&self.roster)))
            .with_messages(history.iter().cloned())
            .with_message(Message::system(closing_prompt(&self.roster)))
            .with_choices(self.roster.options())
            .with_temperature(0.0)
    }

    /// Decide who acts next.
    ///
    /// # Errors
    /// Returns [`Error::RoutingDecision`] or [`Error::UpstreamTimeout`] once
    /// retries are exhausted, or any non-retryable provider error at once.
    #[instrument(skip(self, history), fields(messages = history.len()))]
    pub async fn decide(&self, history: &[Message]) -> Result<Route> {
        let route = retry_with_backoff(
            &self.retry,
            "supervisor",
            || self.decide_once(history),
            Error::is_retryable,
        )
        .await
        .map_err(|e| e.last_error)?;

        debug!(next = %route, "Supervisor decided");
        Ok(route)
    }

    async fn decide_once(&self, history: &[Message]) -> Result<Route> {
        let request = self.build_request(history);
        let response = with_timeout("supervisor", self.timeout, async {
            self.provider.complete(request).await.map_err(Error::from)
        })
        .await?;
        parse_route(&response.content, &self.roster)
    }
}
