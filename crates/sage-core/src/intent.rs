//! Intent classification
//!
//! Labels the latest user utterance with codes from a fixed 9-category
//! taxonomy. Labels are recorded in the state and appended to a [`LogSink`];
//! they never influence routing.

use crate::error::{Error, Result};
use crate::intent_log::{IntentRecord, LogSink};
use crate::utils::with_timeout;
use sage_llm::{CompletionRequest, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};


/// Intent taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum IntentCategory {
    /// Looking for a specific fact
    Factual = 1,
    /// Wants something explained
    Explanatory = 2,
    /// Trying to fix a problem
    Troubleshooting = 3,
    /// Weighing options
    DecisionSupport = 4,
    /// Wants to learn a topic
    LearningSupport = 5,
    /// Asking for personal advice
    PersonalAdvice = 6,
    /// Wants data transformed or analysed
    DataProcessing = 7,
    /// Asking about studies or research findings
    ResearchQuestion = 8,
    /// Not about research at all
    NotResearchRelated = 9,
}

impl IntentCategory {
    /// All categories in code order
    pub const ALL: [IntentCategory; 9] = [
        Self::Factual,
        Self::Explanatory,
        Self::Troubleshooting,
        Self::DecisionSupport,
        Self::LearningSupport,
        Self::PersonalAdvice,
        Self::DataProcessing,
        Self::ResearchQuestion,
        Self::NotResearchRelated,
    ];

    /// Integer code
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Category for a code in `1..=9`
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Label used in the classifier prompt
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Factual => "Factual",
            Self::Explanatory => "Explanatory",
            Self::Troubleshooting => "Troubleshooting",
            Self::DecisionSupport => "Decision Support",
            Self::LearningSupport => "Learning Support",
            Self::PersonalAdvice => "Personal Advice",
            Self::DataProcessing => "Data Processing",
            Self::ResearchQuestion => "Research Question",
            Self::NotResearchRelated => "Not Research Related",
        }
    }
}

impl From<IntentCategory> for u8 {
    fn from(c: IntentCategory) -> Self {
        c.code()
    }
}

impl TryFrom<u8> for IntentCategory {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("intent code {} is outside 1..=9", code))
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Ordered set of intent categories, serialized as `[2, 5]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentSet(Vec<IntentCategory>);

impl IntentSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Integer codes in order
    #[must_use]
    pub fn codes(&self) -> Vec<u8> {
        self.0.iter().map(|c| c.code()).collect()
    }

    /// Membership test
    #[must_use]
    pub fn contains(&self, category: IntentCategory) -> bool {
        self.0.contains(&category)
    }

    /// True when no intent applies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = IntentCategory> + '_ {
        self.0.iter().copied()
    }

    fn insert(&mut self, category: IntentCategory) {
        if !self.0.contains(&category) {
            self.0.push(category);
        }
    }
}

impl FromIterator<IntentCategory> for IntentSet {
    fn from_iter<I: IntoIterator<Item = IntentCategory>>(iter: I) -> Self {
        let mut set = Self::new();
        for category in iter {
            set.insert(category);
        }
        set
    }
}

/// Parse classifier output such as `2,5`, `[2, 5]` or an empty string.
///
/// # Errors
/// Returns [`Error::ClassificationParse`] for a token that is not an integer
/// in `1..=9`.
pub fn parse_intents(raw: &str) -> Result<IntentSet> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    let mut set = IntentSet::new();
    for token in inner.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        // Plain decimal codes only: no sign, no leading zero
        let plain = token.bytes().all(|b| b.is_ascii_digit()) && !token.starts_with('0');
        let category = plain
            .then(|| token.parse::<u8>().ok())
            .flatten()
            .and_then(IntentCategory::from_code)
            .ok_or_else(|| Error::ClassificationParse {
                raw: raw.to_string(),
                token: token.to_string(),
            })?;
        set.insert(category);
    }
    Ok(set)
}

/// Build the classifier system prompt
#[must_use]
pub fn classifier_prompt() -> String {
    let mut prompt = String::from(
        "You classify the intent of a user query for a research assistant.\n\
         Categories:\n",
    );
    for category in IntentCategory::ALL {
        prompt.push_str(&format!("{}. {}\n", category.code(), category.label()));
    }
    prompt.push_str(
        "Several categories may apply. Respond only with the matching numbers \
         separated by commas (for example: 2,5). Respond with nothing else.",
    );
    prompt
}

/// LLM-backed intent classifier
pub struct IntentClassifier {
    provider: Arc<dyn LlmProvider>,
    sink: Arc<dyn LogSink>,
    model: Option<String>,
    timeout: Duration,
}

impl IntentClassifier {
    /// Create a classifier writing to `sink`
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            provider,
            sink,
            model: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify one utterance and append the result to the log.
    ///
    /// # Errors
    /// Returns error on provider failure, timeout, unparseable output, or a
    /// log write failure. Nothing is logged unless parsing succeeded.
    #[instrument(skip(self), fields(provider = %self.provider.name()))]
    pub async fn classify(&self, query: &str) -> Result<IntentSet> {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        let request = CompletionRequest::new(model)
            .with_message(Message::system(classifier_prompt()))
            .with_message(Message::user(query))
            .with_temperature(0.0);

        let response = with_timeout("intent classifier", self.timeout, async {
            self.provider.complete(request).await.map_err(Error::from)
        })
        .await?;

        let intents = parse_intents(&response.content)?;
        debug!(codes = ?intents.codes(), "Query classified");

        self.sink
            .append(IntentRecord {
                query: query.to_string(),
                intents: intents.clone(),
            })
            .await?;
        Ok(intents)
    }
}
