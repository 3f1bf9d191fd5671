//! Context module - Contextual retrieval engine
//!
//! Decides whether a chat question needs persona context and, if so, pulls the
//! matching entries from the key-value store.
//!
//! ## Flow
//!
//! `ContextRetriever` → `CategoryClassifier` → (cache | retry → scan + fetch)
//! → `"key - value"` lines, with category-identification and data-retrieval
//! times measured on every path.

pub mod cache;
pub mod classifier;
pub mod retriever;
pub mod retry;
pub mod scanner;
pub mod timer;

pub use cache::{CacheStats, ScanCache, ScanKey};
pub use classifier::{Category, CategoryClassifier, ClassifyError, KeywordClassifier};
pub use retriever::{format_entries, key_pattern, ContextRetriever, RetrievalOutcome};
pub use retry::{retry_transient, RetryExhausted, RetryPolicy};
pub use scanner::{fetch_entries, scan_and_fetch, scan_keys};
pub use timer::{Timer, TimerGuard};
