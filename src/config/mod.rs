//! Configuration Module
//!
//! Server, store, retrieval, LLM and interaction-log settings loaded from a
//! TOML file.
//!
//! ## Loading Order
//!
//! 1. `PERSONA_CONFIG` environment variable (path to TOML file)
//! 2. `persona_chat.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(ChatConfig::load());
//!
//! // Anywhere else:
//! let batch = config::get().retrieval.batch_size;
//! ```

mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::*;

use std::sync::OnceLock;

static CHAT_CONFIG: OnceLock<ChatConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: ChatConfig) {
    if CHAT_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Global configuration. Falls back to built-in defaults when `init()` was
/// never called (unit tests, library use).
pub fn get() -> &'static ChatConfig {
    CHAT_CONFIG.get_or_init(ChatConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    CHAT_CONFIG.get().is_some()
}
