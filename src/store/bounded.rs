//! Connection-bounded store wrapper
//!
//! Caps concurrent in-flight operations at the configured pool size and
//! fails any single operation that exceeds the operation timeout. A timeout
//! surfaces as `StoreError::Timeout`, which the retry controller treats as
//! transient.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{KeyValueStore, ScanCursor, ScanPage, StoreError};

/// Wraps a store with a per-operation timeout and a concurrency limit
pub struct BoundedStore<S> {
    inner: S,
    permits: Arc<Semaphore>,
    operation_timeout: Duration,
}

impl<S: KeyValueStore> BoundedStore<S> {
    pub fn new(inner: S, max_connections: usize, operation_timeout: Duration) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            operation_timeout,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of operations that could start right now without waiting
    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        // Waiting for a free connection counts against the timeout too.
        let guarded = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| StoreError::Unavailable("connection pool closed".into()))?;
            op.await
        };

        match tokio::time::timeout(self.operation_timeout, guarded).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.operation_timeout)),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for BoundedStore<S> {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    async fn scan(
        &self,
        cursor: &ScanCursor,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        self.bounded(self.inner.scan(cursor, pattern, count)).await
    }

    async fn batched_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.bounded(self.inner.batched_get(keys)).await
    }

    fn store_name(&self) -> &'static str {
        self.inner.store_name()
    }
}
