//! Application configuration types

use sage_core::CheckpointBackendConfig;
use sage_llm::GuidedMode;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub graph: GraphAppConfig,
    #[serde(default)]
    pub checkpoint: CheckpointBackendConfig,
    #[serde(default)]
    pub intent_log: IntentLogConfig,
    #[serde(default)]
    pub knowledge_graph: KnowledgeGraphAppConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai_compat" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub guided_mode: GuidedMode,
}

fn default_provider() -> String {
    "openai_compat".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: None,
            api_key: None,
            timeout_secs: default_llm_timeout(),
            guided_mode: GuidedMode::default(),
        }
    }
}

/// How a configured worker answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// System prompt + history
    Persona,
    /// Retrieval and knowledge-graph backed
    Research,
}

/// One worker on the roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    pub kind: WorkerKind,
    /// Competence shown to the supervisor
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Routing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_workers")]
    pub workers: Vec<WorkerConfig>,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_call_timeout() -> u64 {
    30
}

fn default_workers() -> Vec<WorkerConfig> {
    sage_core::Roster::reference()
        .profiles()
        .iter()
        .map(|p| WorkerConfig {
            name: p.name.clone(),
            kind: if p.name == "researcher" {
                WorkerKind::Research
            } else {
                WorkerKind::Persona
            },
            description: p.description.clone(),
            system_prompt: (p.name == "comedian").then(|| "You are a comedian".to_string()),
        })
        .collect()
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_call_timeout(),
            workers: default_workers(),
        }
    }
}

/// Graph shape and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphAppConfig {
    #[serde(default = "default_true")]
    pub intent_enabled: bool,
    /// Workers hand back to the supervisor instead of finishing
    #[serde(default)]
    pub loop_back: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_steps() -> usize {
    25
}

impl Default for GraphAppConfig {
    fn default() -> Self {
        Self {
            intent_enabled: true,
            loop_back: false,
            max_steps: default_max_steps(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentLogConfig {
    #[serde(default = "default_intent_log_path")]
    pub path: String,
}

fn default_intent_log_path() -> String {
    "intent_log.json".to_string()
}

impl Default for IntentLogConfig {
    fn default() -> Self {
        Self {
            path: default_intent_log_path(),
        }
    }
}

/// Knowledge graph lookups for the research worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraphAppConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_graph_name")]
    pub graph_name: String,
    #[serde(default = "default_terminal_label")]
    pub terminal_label: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Per-entity bound; must stay below `graph.call_timeout_secs`
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// JSON graph served from memory instead of RedisGraph
    #[serde(default)]
    pub local_graph: Option<String>,
    /// JSON subgraph preloaded into the cache
    #[serde(default)]
    pub cache_seed: Option<String>,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_graph_name() -> String {
    "kg".to_string()
}

fn default_query_timeout() -> u64 {
    10
}

fn default_terminal_label() -> String {
    sage_kg::KnowledgeGraphConfig::default().terminal_label
}

fn default_limit() -> usize {
    sage_kg::KnowledgeGraphConfig::default().limit
}

impl Default for KnowledgeGraphAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: default_redis_url(),
            graph_name: default_graph_name(),
            terminal_label: default_terminal_label(),
            limit: default_limit(),
            query_timeout_secs: default_query_timeout(),
            local_graph: None,
            cache_seed: None,
            cache_ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Retrieval service; no context is retrieved when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_call_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_file_prefix() -> String {
    "sage.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}
