//! Sled-backed contextual store
//!
//! Keys and values are stored as UTF-8 bytes. Keys sort lexicographically, so
//! a pattern scan only walks the range that starts at the pattern's literal
//! prefix. Sled calls are blocking and run on the blocking thread pool.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::{scan_ordered, KeyPattern, KeyValueStore, ScanCursor, ScanPage, StoreError};

/// Persistent key-value store for persona context entries
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    identity: String,
}

impl SledStore {
    /// Open or create the store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        tracing::info!("Context store opened at {:?}", path_ref);
        Ok(Self {
            db: Arc::new(db),
            identity: format!("sled:{}", path_ref.display()),
        })
    }

    /// Insert or replace an entry
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.db.remove(key.as_bytes())?.is_some())
    }

    /// Load many entries at once, returning the number written
    pub fn put_all<'a, I>(&self, entries: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut batch = sled::Batch::default();
        let mut count = 0;
        for (key, value) in entries {
            batch.insert(key.as_bytes(), value.as_bytes());
            count += 1;
        }
        self.db.apply_batch(batch)?;
        Ok(count)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Total number of entries
    pub fn count(&self) -> usize {
        self.db.len()
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&sled::Db) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[async_trait]
impl KeyValueStore for SledStore {
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
        let cursor = cursor.clone();

        self.blocking(move |db| {
            let prefix = compiled.literal_prefix().as_bytes().to_vec();
            scan_ordered(&cursor, &compiled, count, |lower| {
                let start = lower.map_or(prefix, |l| l.as_bytes().to_vec());
                db.range(start..).map(|item| {
                    item.map(|(k, _)| decode(&k)).map_err(StoreError::from)
                })
            })
        })
        .await
    }

    async fn batched_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let keys = keys.to_vec();
        self.blocking(move |db| {
            keys.iter()
                .map(|k| -> Result<Option<String>, StoreError> {
                    Ok(db.get(k.as_bytes())?.map(|v| decode(&v)))
                })
                .collect()
        })
        .await
    }

    fn store_name(&self) -> &'static str {
        "Sled"
    }
}
