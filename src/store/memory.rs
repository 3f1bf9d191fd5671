//! In-memory key-value store
//!
//! Ordered map behind a `RwLock`. Not durable; data is lost on restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

use super::{scan_ordered, KeyPattern, KeyValueStore, ScanCursor, ScanPage, StoreError};

/// In-memory store with the same scan semantics as `SledStore`
pub struct MemoryStore {
    identity: String,
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store with a unique identity
    pub fn new() -> Self {
        Self::with_identity(format!("memory:{}", uuid::Uuid::new_v4()))
    }

    /// Create an empty store with an explicit identity
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.write();
            for (k, v) in iter {
                entries.insert(k.into(), v.into());
            }
        }
        store
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn scan(
        &self,
        cursor: &ScanCursor,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let compiled = KeyPattern::compile(pattern)?;
        let entries = self.entries.read();
        let prefix = compiled.literal_prefix().to_string();

        scan_ordered(cursor, &compiled, count, |lower| {
            let start = lower.map_or(prefix, str::to_string);
            entries
                .range::<String, _>((Bound::Included(start), Bound::Unbounded))
                .map(|(k, _)| Ok(k.clone()))
        })
    }

    async fn batched_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let entries = self.entries.read();
        Ok(keys.iter().map(|k| entries.get(k).cloned()).collect())
    }

    fn store_name(&self) -> &'static str {
        "Memory"
    }
}
