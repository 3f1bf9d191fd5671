//! System-wide default constants.
//!
//! Every `#[serde(default)]` in `app_config` resolves to one of these, so a
//! missing TOML key and a missing TOML file behave the same way.

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8000";

// ============================================================================
// Context Store
// ============================================================================

/// On-disk location of the sled context store.
pub const STORE_PATH: &str = "./data/context";

/// Per-operation timeout for store calls (ms).
pub const STORE_OPERATION_TIMEOUT_MS: u64 = 5_000;

/// Maximum concurrent in-flight store operations.
pub const STORE_MAX_CONNECTIONS: usize = 10;

// ============================================================================
// Retrieval Engine
// ============================================================================

/// Total scan+fetch attempts per retrieval, including the first.
pub const MAX_RETRIEVAL_ATTEMPTS: u32 = 3;

/// Keys requested per scan round trip.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Linear backoff unit (ms). The n-th retry waits `n * base`.
pub const RETRY_BACKOFF_BASE_MS: u64 = 100;

/// Memoized scan results kept in the LRU. Zero disables memoization.
pub const SCAN_CACHE_CAPACITY: usize = 128;

/// Questions longer than this are not classified.
pub const MAX_QUESTION_CHARS: usize = 2_000;

// ============================================================================
// LLM
// ============================================================================

/// OpenAI-compatible endpoint root.
pub const LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Environment variable holding the bearer token.
pub const LLM_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Model used when a request does not name one.
pub const LLM_DEFAULT_MODEL: &str = "meta-llama/llama-3.1-70b-instruct";

/// HTTP timeout for one completion request (seconds).
pub const LLM_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Interaction Log
// ============================================================================

/// On-disk location of the sled interaction log.
pub const INTERACTION_LOG_PATH: &str = "./data/interactions";

/// Rows returned by `GET /cv/interactions` when no limit is given.
pub const INTERACTIONS_DEFAULT_LIMIT: usize = 50;

/// Upper bound on `limit` for `GET /cv/interactions`.
pub const INTERACTIONS_MAX_LIMIT: usize = 500;

// ============================================================================
// Chat Defaults
// ============================================================================

/// Persona namespace used when a request omits `personality`.
pub const DEFAULT_PERSONALITY: &str = "delhi";
