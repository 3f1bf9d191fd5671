//! Cursor-driven batch scan and pipelined fetch
//!
//! `scan_and_fetch` is one attempt of the retrieval pipeline: walk the
//! keyspace page by page, and for each non-empty page issue one batched read.
//! Errors abort the attempt; retrying is the caller's job.

use tracing::trace;

use crate::store::{KeyValueStore, ScanCursor, StoreError};

/// Collect every key matching `pattern`, `batch_size` keys per round trip.
///
/// Empty pages are not terminal: only the store's `Done` cursor ends the scan.
pub async fn scan_keys(
    store: &dyn KeyValueStore,
    pattern: &str,
    batch_size: usize,
) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut cursor = ScanCursor::Start;

    loop {
        let page = store.scan(&cursor, pattern, batch_size).await?;
        trace!(pattern, batch = page.keys.len(), "scan page");
        keys.extend(page.keys);
        if page.next.is_done() {
            return Ok(keys);
        }
        cursor = page.next;
    }
}

/// Read `keys` in one batched call and keep only the ones still present,
/// in input order.
pub async fn fetch_entries(
    store: &dyn KeyValueStore,
    keys: Vec<String>,
) -> Result<Vec<(String, String)>, StoreError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let values = store.batched_get(&keys).await?;
    if values.len() != keys.len() {
        return Err(StoreError::Backend(format!(
            "batched get returned {} values for {} keys",
            values.len(),
            keys.len()
        )));
    }
    Ok(keys
        .into_iter()
        .zip(values)
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect())
}

/// One full scan-then-fetch pass, fetching each page as soon as it arrives.
pub async fn scan_and_fetch(
    store: &dyn KeyValueStore,
    pattern: &str,
    batch_size: usize,
) -> Result<Vec<(String, String)>, StoreError> {
    let mut results = Vec::new();
    let mut cursor = ScanCursor::Start;

    loop {
        let page = store.scan(&cursor, pattern, batch_size).await?;
        if !page.keys.is_empty() {
            results.extend(fetch_entries(store, page.keys).await?);
        }
        if page.next.is_done() {
            return Ok(results);
        }
        cursor = page.next;
    }
}
