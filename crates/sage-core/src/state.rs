//! Conversation state and the merge rule applied after every transition.

use crate::intent::IntentSet;
use sage_llm::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal routing sentinel
pub const FINISH: &str = "FINISH";

/// A routing decision: a registered worker or the terminal sentinel.
///
/// Serialized as the bare name (`"researcher"`, `"FINISH"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Route {
    /// Hand the turn to this worker
    Worker(String),
    /// End the turn
    Finish,
}

impl Route {
    /// Route to a worker
    #[must_use]
    pub fn worker(name: impl Into<String>) -> Self {
        Self::Worker(name.into())
    }

    /// Name as sent to and read from the model
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Worker(name) => name,
            Self::Finish => FINISH,
        }
    }

    /// True for [`Route::Finish`]
    #[must_use]
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish)
    }
}

impl From<String> for Route {
    fn from(s: String) -> Self {
        if s == FINISH {
            Self::Finish
        } else {
            Self::Worker(s)
        }
    }
}

impl From<Route> for String {
    fn from(route: Route) -> Self {
        match route {
            Route::Worker(name) => name,
            Route::Finish => FINISH.to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State threaded through the orchestration graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Conversation identity
    pub thread_id: String,
    /// Full history, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Last routing decision
    #[serde(default)]
    pub next: Option<Route>,
    /// Intents of the latest user turn
    #[serde(default)]
    pub intents: Option<IntentSet>,
}

impl ConversationState {
    /// Empty state for a thread
    #[must_use]
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            next: None,
            intents: None,
        }
    }

    /// Merge a component's output: messages append, `next` and `intents`
    /// overwrite when present.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(next) = update.next {
            self.next = Some(next);
        }
        if let Some(intents) = update.intents {
            self.intents = Some(intents);
        }
    }

    /// Content of the most recent user message
    #[must_use]
    pub fn latest_user_utterance(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    /// Most recent message
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Partial output of one component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Messages to append
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Routing decision to record
    #[serde(default)]
    pub next: Option<Route>,
    /// Intents to record
    #[serde(default)]
    pub intents: Option<IntentSet>,
}

impl StateUpdate {
    /// A single user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::message(Message::user(content))
    }

    /// A single message
    #[must_use]
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }

    /// Append another message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Record a routing decision
    #[must_use]
    pub fn with_next(mut self, route: Route) -> Self {
        self.next = Some(route);
        self
    }

    /// Record intents
    #[must_use]
    pub fn with_intents(mut self, intents: IntentSet) -> Self {
        self.intents = Some(intents);
        self
    }

    /// True when applying would change nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.next.is_none() && self.intents.is_none()
    }
}
