//! Chat service configuration - every tunable as a TOML value
//!
//! Each struct implements `Default` with values from `defaults`, so a missing
//! file, an empty file, and a partial file all produce a working config.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PERSONA_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "persona_chat.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a chat deployment.
///
/// Load with `ChatConfig::load()` which searches:
/// 1. `$PERSONA_CONFIG` env var
/// 2. `./persona_chat.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Context key-value store
    #[serde(default)]
    pub store: StoreConfig,

    /// Retrieval engine tuning and category rules
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub interaction_log: InteractionLogConfig,
}

impl ChatConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {CONFIG_ENV}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check limits and category rules.
    ///
    /// Rules:
    /// - Retries, batch size and store connections must be > 0
    /// - Category names must be non-empty, `:`-free and unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let r = &self.retrieval;
        if r.max_retries == 0 {
            errors.push("retrieval.max_retries must be > 0".to_string());
        }
        if r.batch_size == 0 {
            errors.push("retrieval.batch_size must be > 0".to_string());
        }
        if r.max_question_chars == 0 {
            errors.push("retrieval.max_question_chars must be > 0".to_string());
        }

        let mut seen = HashSet::new();
        for (i, rule) in r.categories.iter().enumerate() {
            let name = rule.name.trim();
            if name.is_empty() {
                errors.push(format!("retrieval.categories[{i}].name must not be empty"));
            } else if name.contains(':') {
                errors.push(format!(
                    "retrieval.categories[{i}].name '{name}' must not contain ':'"
                ));
            } else if !seen.insert(name) {
                errors.push(format!("retrieval.categories: duplicate category '{name}'"));
            }
        }

        if self.store.max_connections == 0 {
            errors.push("store.max_connections must be > 0".to_string());
        }
        if self.store.operation_timeout_ms == 0 {
            errors.push("store.operation_timeout_ms must be > 0".to_string());
        }
        if self.llm.timeout_secs == 0 {
            errors.push("llm.timeout_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address. `--addr` on the command line takes precedence.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Context Store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// When false the service runs without persona context.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(defaults::STORE_PATH)
}

fn default_true() -> bool {
    true
}

fn default_operation_timeout_ms() -> u64 {
    defaults::STORE_OPERATION_TIMEOUT_MS
}

fn default_max_connections() -> usize {
    defaults::STORE_MAX_CONNECTIONS
}

impl StoreConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            enabled: true,
            operation_timeout_ms: default_operation_timeout_ms(),
            max_connections: default_max_connections(),
        }
    }
}

// ============================================================================
// Retrieval Engine
// ============================================================================

/// One keyword rule: a question containing any keyword as a whole word
/// belongs to `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CategoryRule {
    fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Total scan+fetch attempts per retrieval
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Zero disables scan memoization
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,

    /// Ordered rules; the first match wins
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

fn default_max_retries() -> u32 {
    defaults::MAX_RETRIEVAL_ATTEMPTS
}

fn default_batch_size() -> usize {
    defaults::DEFAULT_BATCH_SIZE
}

fn default_backoff_base_ms() -> u64 {
    defaults::RETRY_BACKOFF_BASE_MS
}

fn default_cache_capacity() -> usize {
    defaults::SCAN_CACHE_CAPACITY
}

fn default_max_question_chars() -> usize {
    defaults::MAX_QUESTION_CHARS
}

// Order matters: "where" questions about food or history land in those
// categories before the generic places rule sees them.
fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "personal",
            &["you", "your", "yourself", "born", "age", "favourite", "favorite", "hobby", "hobbies"],
        ),
        CategoryRule::new(
            "food",
            &["food", "eat", "eating", "dish", "dishes", "cuisine", "restaurant", "restaurants", "snack", "snacks", "chaat", "dessert", "breakfast", "lunch", "dinner"],
        ),
        CategoryRule::new(
            "history",
            &["history", "historical", "built", "founded", "ancient", "empire", "mughal", "mughals", "monument", "monuments", "war"],
        ),
        CategoryRule::new(
            "places",
            &["where", "visit", "place", "places", "market", "markets", "shopping", "park", "temple", "travel", "metro"],
        ),
        CategoryRule::new(
            "culture",
            &["culture", "language", "music", "dance", "art", "tradition", "traditions", "people", "clothes"],
        ),
        CategoryRule::new(
            "events",
            &["festival", "festivals", "event", "events", "celebrate", "celebration", "diwali", "holi", "concert"],
        ),
    ]
}

impl RetrievalConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            backoff_base_ms: default_backoff_base_ms(),
            cache_capacity: default_cache_capacity(),
            max_question_chars: default_max_question_chars(),
            categories: default_categories(),
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root, without the `/chat/completions` suffix
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    defaults::LLM_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    defaults::LLM_API_KEY_ENV.to_string()
}

fn default_model() -> String {
    defaults::LLM_DEFAULT_MODEL.to_string()
}

fn default_llm_timeout_secs() -> u64 {
    defaults::LLM_TIMEOUT_SECS
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

// ============================================================================
// Interaction Log
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interaction_log_path")]
    pub path: PathBuf,
}

fn default_interaction_log_path() -> PathBuf {
    PathBuf::from(defaults::INTERACTION_LOG_PATH)
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_interaction_log_path(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
