//! Typed configuration tree.
//!
//! Assembled once at startup by the figment loader and passed explicitly
//! into every component; there is no process-wide mutable configuration
//! state anywhere in the crate.

use serde::{Deserialize, Serialize};

use super::patch::PatchMode;

/// Main configuration structure for Redline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker loop configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Retry policy for external agent calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reasoning agent (claim extraction, mission planning, scoring)
    #[serde(default)]
    pub reasoning: ReasoningAgentConfig,

    /// Vision agent (page re-verification)
    #[serde(default)]
    pub vision: VisionAgentConfig,

    /// Knowledge base location (read-only for this pipeline)
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Patcher behavior and state-layer roots
    #[serde(default)]
    pub patcher: PatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            worker: WorkerConfig::default(),
            retry: RetryConfig::default(),
            reasoning: ReasoningAgentConfig::default(),
            vision: VisionAgentConfig::default(),
            knowledge: KnowledgeConfig::default(),
            patcher: PatcherConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".redline/redline.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rolling file output
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Worker loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Seconds between queue polls when idle
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// Minutes after which a processing entry is considered stalled
    /// and eligible for crash recovery
    #[serde(default = "default_stall_minutes")]
    pub stall_minutes: i64,

    /// Maximum missions dispatched to the vision agent concurrently
    #[serde(default = "default_mission_concurrency")]
    pub mission_concurrency: usize,

    /// Ceiling on one run's verification phase, in seconds. Missions not
    /// finished by then are marked failed and scoring proceeds.
    #[serde(default = "default_run_deadline_seconds")]
    pub run_deadline_seconds: u64,

    /// Per vision call timeout, in seconds
    #[serde(default = "default_mission_timeout_seconds")]
    pub mission_timeout_seconds: u64,

    /// Path of the ambient status record
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

const fn default_poll_seconds() -> u64 {
    2
}

const fn default_stall_minutes() -> i64 {
    30
}

const fn default_mission_concurrency() -> usize {
    3
}

const fn default_run_deadline_seconds() -> u64 {
    1800
}

const fn default_mission_timeout_seconds() -> u64 {
    300
}

fn default_status_path() -> String {
    ".redline/status.json".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_seconds: default_poll_seconds(),
            stall_minutes: default_stall_minutes(),
            mission_concurrency: default_mission_concurrency(),
            run_deadline_seconds: default_run_deadline_seconds(),
            mission_timeout_seconds: default_mission_timeout_seconds(),
            status_path: default_status_path(),
        }
    }
}

/// Retry policy configuration for external agent calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    2_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Reasoning-agent endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReasoningAgentConfig {
    #[serde(default = "default_reasoning_base_url")]
    pub base_url: String,

    #[serde(default = "default_reasoning_model")]
    pub model: String,

    /// Env var holding the API key; the key itself never lives in config files
    #[serde(default = "default_reasoning_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_agent_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_reasoning_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_reasoning_model() -> String {
    "gpt-5.2".to_string()
}

fn default_reasoning_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_agent_timeout_seconds() -> u64 {
    300
}

impl Default for ReasoningAgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_reasoning_base_url(),
            model: default_reasoning_model(),
            api_key_env: default_reasoning_api_key_env(),
            timeout_seconds: default_agent_timeout_seconds(),
        }
    }
}

/// Vision-agent endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisionAgentConfig {
    #[serde(default = "default_vision_base_url")]
    pub base_url: String,

    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_vision_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_agent_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_vision_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_vision_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_vision_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for VisionAgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_vision_base_url(),
            model: default_vision_model(),
            api_key_env: default_vision_api_key_env(),
            timeout_seconds: default_agent_timeout_seconds(),
        }
    }
}

/// Knowledge base location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KnowledgeConfig {
    /// Root directory of the ingested knowledge store
    #[serde(default = "default_knowledge_root")]
    pub root: String,
}

fn default_knowledge_root() -> String {
    "knowledge_store".to_string()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: default_knowledge_root(),
        }
    }
}

/// Patcher behavior and state-layer roots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PatcherConfig {
    /// shadow (propose + audit only) or live (apply writes)
    #[serde(default)]
    pub mode: PatchMode,

    /// Root directory of the experience/tool-hint state layers
    #[serde(default = "default_experience_root")]
    pub experience_root: String,
}

fn default_experience_root() -> String {
    "identity/experience".to_string()
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            mode: PatchMode::default(),
            experience_root: default_experience_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.path, ".redline/redline.db");
        assert_eq!(config.worker.poll_seconds, 2);
        assert_eq!(config.worker.mission_concurrency, 3);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.patcher.mode, PatchMode::Shadow);
    }

    #[test]
    fn test_config_deserializes_from_partial_yaml() {
        let yaml = "worker:\n  mission_concurrency: 8\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.worker.mission_concurrency, 8);
        // Untouched sections keep their defaults.
        assert_eq!(config.worker.poll_seconds, 2);
        assert_eq!(config.database.max_connections, 10);
    }
}
