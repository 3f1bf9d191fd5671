//! Key-value store abstraction for contextual data
//!
//! The retrieval engine only needs two primitives from a backing store:
//! a cursor-driven keyspace scan restricted to a glob pattern, and a batched,
//! non-transactional multi-get. Everything else (persistence, connection
//! management) lives behind the `KeyValueStore` trait so backends can be
//! swapped:
//! - `SledStore`: persistent store for deployments
//! - `MemoryStore`: in-memory store for tests and ephemeral runs
//! - `BoundedStore`: wraps any store with operation timeouts and a
//!   connection-pool-sized concurrency limit

pub mod bounded;
pub mod memory;
pub mod pattern;
pub mod sled_store;

pub use bounded::BoundedStore;
pub use memory::MemoryStore;
pub use pattern::{escape_segment, KeyPattern};
pub use sled_store::SledStore;

use async_trait::async_trait;
use std::time::Duration;

/// Position in a cursor-driven scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCursor {
    /// Begin a new traversal
    Start,
    /// Resume strictly after this key
    After(String),
    /// The traversal is finished
    Done,
}

impl ScanCursor {
    pub fn is_done(&self) -> bool {
        matches!(self, ScanCursor::Done)
    }
}

/// One page of a cursor scan.
///
/// `keys` may be empty while `next` is still resumable: the store examined a
/// slice of the keyspace and nothing in it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub next: ScanCursor,
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store is corrupted: {0}")]
    Corrupted(String),
    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_) | StoreError::Unavailable(_) | StoreError::Backend(_)
        )
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Io(e) => StoreError::Backend(e.to_string()),
            sled::Error::Corruption { .. } | sled::Error::ReportableBug(_) => {
                StoreError::Corrupted(err.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Trait for contextual key-value store backends
///
/// Every implementation must be thread-safe (Send + Sync) since concurrent
/// chat requests share one store handle.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stable identity of this store instance, used to key the scan cache.
    fn identity(&self) -> &str;

    /// Return up to `count` keys matching `pattern` starting at `cursor`,
    /// plus the cursor to resume from.
    async fn scan(
        &self,
        cursor: &ScanCursor,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError>;

    /// Read all `keys` in one round trip. The result is positionally aligned
    /// with `keys`; absent keys yield `None`.
    async fn batched_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Get the store name for logging and health checks
    fn store_name(&self) -> &'static str;
}

/// Examine up to `count` keys of an ordered keyspace after `cursor` and keep
/// the ones matching `pattern`.
///
/// Shared by the ordered backends. `keys_from` yields keys in ascending order
/// starting at (and possibly including) the given lower bound.
pub(crate) fn scan_ordered<I, F>(
    cursor: &ScanCursor,
    pattern: &KeyPattern,
    count: usize,
    keys_from: F,
) -> Result<ScanPage, StoreError>
where
    F: FnOnce(Option<&str>) -> I,
    I: Iterator<Item = Result<String, StoreError>>,
{
    let lower = match cursor {
        ScanCursor::Done => {
            return Ok(ScanPage {
                keys: Vec::new(),
                next: ScanCursor::Done,
            })
        }
        ScanCursor::Start => None,
        ScanCursor::After(key) => Some(key.as_str()),
    };

    let prefix = pattern.literal_prefix();
    let count = count.max(1);
    let mut examined = 0usize;
    let mut last_examined: Option<String> = None;
    let mut keys = Vec::new();

    for item in keys_from(lower) {
        let key = item?;
        if lower == Some(key.as_str()) {
            continue;
        }
        if !key.starts_with(prefix) {
            break;
        }
        examined += 1;
        if pattern.matches(&key) {
            keys.push(key.clone());
        }
        last_examined = Some(key);
        if examined == count {
            break;
        }
    }

    let next = match last_examined {
        Some(key) if examined == count => ScanCursor::After(key),
        _ => ScanCursor::Done,
    };

    Ok(ScanPage { keys, next })
}
