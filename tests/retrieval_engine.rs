//! Retrieval Engine Integration Tests
//!
//! Drives `ContextRetriever::retrieve_context` against a scripted store that
//! counts calls, injects failures, drops keys between scan and fetch, and
//! adds latency. Covers the observable contract: formatting, degradation,
//! retry/backoff, memoization and concurrency.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use persona_chat::config::RetrievalConfig;
use persona_chat::context::{Category, ContextRetriever};
use persona_chat::store::{
    BoundedStore, KeyPattern, KeyValueStore, MemoryStore, ScanCursor, ScanPage, StoreError,
};

// ============================================================================
// Scripted store
// ============================================================================

struct ScriptedStore {
    inner: MemoryStore,
    scan_calls: AtomicU32,
    get_calls: AtomicU32,
    /// Scan calls still to fail with a transient error
    failures_left: AtomicU32,
    /// Scan calls still to fail with a permanent error
    corrupt_left: AtomicU32,
    /// Keys that scan returns but fetch reports as gone
    vanished: Mutex<HashSet<String>>,
    /// Serve an empty, non-terminal first page
    empty_first_page: bool,
    latency: Duration,
}

impl ScriptedStore {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            inner: entries.iter().copied().collect(),
            scan_calls: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
            failures_left: AtomicU32::new(0),
            corrupt_left: AtomicU32::new(0),
            vanished: Mutex::new(HashSet::new()),
            empty_first_page: false,
            latency: Duration::ZERO,
        }
    }

    fn failing(self, times: u32) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    fn corrupt(self, times: u32) -> Self {
        self.corrupt_left.store(times, Ordering::SeqCst);
        self
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn with_empty_first_page(mut self) -> Self {
        self.empty_first_page = true;
        self
    }

    fn vanish(&self, key: &str) {
        self.vanished.lock().insert(key.to_string());
    }

    fn scans(&self) -> u32 {
        self.scan_calls.load(Ordering::SeqCst)
    }

    fn gets(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl KeyValueStore for ScriptedStore {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    async fn scan(
        &self,
        cursor: &ScanCursor,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if take_one(&self.failures_left) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        if take_one(&self.corrupt_left) {
            return Err(StoreError::Corrupted("bad page".into()));
        }
        if self.empty_first_page && *cursor == ScanCursor::Start {
            let prefix = KeyPattern::compile(pattern)?.literal_prefix().to_string();
            return Ok(ScanPage {
                keys: Vec::new(),
                next: ScanCursor::After(prefix),
            });
        }
        self.inner.scan(cursor, pattern, count).await
    }

    async fn batched_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let vanished = self.vanished.lock().clone();
        let values = self.inner.batched_get(keys).await?;
        Ok(keys
            .iter()
            .zip(values)
            .map(|(k, v)| if vanished.contains(k) { None } else { v })
            .collect())
    }

    fn store_name(&self) -> &'static str {
        "Scripted"
    }
}

// ============================================================================
// Helpers
// ============================================================================

const FOOD_QUESTION: &str = "Where can I find good street food?";
const HISTORY_QUESTION: &str = "Who built the Red Fort and when?";

fn retriever_with(max_retries: u32, backoff_base_ms: u64) -> ContextRetriever {
    let config = RetrievalConfig {
        max_retries,
        backoff_base_ms,
        ..RetrievalConfig::default()
    };
    ContextRetriever::from_config(&config).unwrap()
}

fn retriever() -> ContextRetriever {
    retriever_with(3, 10)
}

/// Shared sink for formatted log lines
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn food_store() -> ScriptedStore {
    ScriptedStore::new(&[
        ("delhi:food:k1", "v1"),
        ("delhi:food:k2", "v2"),
        ("delhi:history:fort", "Built in 1648"),
        ("mumbai:food:vada", "Vada pav"),
    ])
}

// ============================================================================
// Input validation and classification
// ============================================================================

#[tokio::test]
async fn empty_or_whitespace_question_returns_zeroes() {
    let store = food_store();
    let r = retriever();

    for question in ["", "   ", "\n\t"] {
        let outcome = r.retrieve_context(question, Some(&store), "delhi").await;
        assert_eq!(outcome.context, "");
        assert_eq!(outcome.cit_ms, 0.0);
        assert_eq!(outcome.drt_ms, 0.0);
    }
    assert_eq!(store.scans(), 0);
}

#[tokio::test]
async fn blank_personality_returns_zeroes() {
    let store = food_store();
    let outcome = retriever()
        .retrieve_context(FOOD_QUESTION, Some(&store), "  ")
        .await;
    assert_eq!((outcome.cit_ms, outcome.drt_ms), (0.0, 0.0));
    assert_eq!(store.scans(), 0);
}

#[tokio::test]
async fn no_context_question_skips_retrieval() {
    let store = food_store();
    let outcome = retriever()
        .retrieve_context("hello there", Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context, "");
    assert!(outcome.cit_ms >= 0.0);
    assert_eq!(outcome.drt_ms, 0.0);
    assert_eq!(outcome.category, Some(Category::NoContext));
    assert_eq!(store.scans(), 0);
}

// ============================================================================
// Scan, fetch and formatting
// ============================================================================

#[tokio::test]
async fn entries_formatted_in_scan_order() {
    let store = food_store();
    let outcome = retriever()
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context, "delhi:food:k1 - v1\ndelhi:food:k2 - v2");
    assert_eq!(outcome.category, Some(Category::Tagged("food".into())));
    assert!(outcome.cit_ms >= 0.0);
    assert!(outcome.drt_ms >= 0.0);
    // One page, one batched read
    assert_eq!((store.scans(), store.gets()), (1, 1));
}

#[tokio::test]
async fn personalities_do_not_leak() {
    let store = food_store();
    let outcome = retriever()
        .retrieve_context(FOOD_QUESTION, Some(&store), "mumbai")
        .await;
    assert_eq!(outcome.context, "mumbai:food:vada - Vada pav");
}

#[tokio::test]
async fn key_vanishing_between_scan_and_fetch_is_skipped() {
    let store = food_store();
    store.vanish("delhi:food:k1");

    let outcome = retriever()
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;
    assert_eq!(outcome.context, "delhi:food:k2 - v2");
}

#[tokio::test]
async fn empty_page_mid_scan_does_not_end_scan_or_consume_retry() {
    let store = food_store().with_empty_first_page();
    // A single attempt: an empty page must not be treated as a failure
    let outcome = retriever_with(1, 10)
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context, "delhi:food:k1 - v1\ndelhi:food:k2 - v2");
    assert_eq!(store.scans(), 2);
    // The empty page triggers no fetch
    assert_eq!(store.gets(), 1);
}

#[tokio::test]
async fn many_pages_issue_one_fetch_per_page() {
    let entries: Vec<(String, String)> = (0..250)
        .map(|i| (format!("delhi:food:{i:03}"), format!("dish {i}")))
        .collect();
    let store = ScriptedStore::new(
        &entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<Vec<_>>(),
    );

    let outcome = retriever()
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context.lines().count(), 250);
    assert!(outcome.context.starts_with("delhi:food:000 - dish 0\n"));
    // 100 + 100 + 50 keys
    assert_eq!(store.scans(), 3);
    assert_eq!(store.gets(), 3);
}

// ============================================================================
// Retry and backoff
// ============================================================================

#[tokio::test]
async fn transient_failures_then_success() {
    let base = 50;
    let store = food_store().failing(2);
    let started = Instant::now();

    let outcome = retriever_with(3, base)
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context, "delhi:food:k1 - v1\ndelhi:food:k2 - v2");
    assert_eq!(store.scans(), 3);
    // base*1 + base*2
    assert!(started.elapsed() >= Duration::from_millis(3 * base));
    assert!(outcome.drt_ms >= (3 * base) as f64);
}

#[tokio::test]
async fn exhausted_retries_degrade_to_empty_context() {
    let base = 20;
    let store = food_store().failing(3);

    let outcome = retriever_with(3, base)
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context, "");
    assert_eq!(outcome.category, Some(Category::Tagged("food".into())));
    assert_eq!(store.scans(), 3);
    assert_eq!(store.gets(), 0);
    // The measured phase includes both backoff waits
    assert!(outcome.drt_ms >= (3 * base) as f64);
}

#[tokio::test]
async fn exhaustion_logs_error_with_phase_and_cause() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    // Current-thread runtime, so the thread-local default sees every event
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = food_store().failing(3);
    let outcome = retriever_with(3, 1)
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;
    assert_eq!(outcome.context, "");

    let output = logs.contents();
    let giving_up = output
        .lines()
        .find(|line| line.contains("giving up"))
        .unwrap_or_else(|| panic!("no exhaustion event in:\n{output}"));
    assert!(giving_up.contains("ERROR"), "{giving_up}");
    assert!(giving_up.contains("scan_and_fetch"), "{giving_up}");
    assert!(giving_up.contains("connection refused"), "{giving_up}");
    assert!(giving_up.contains("attempts=3"), "{giving_up}");
    // Each non-final failure is logged as a retry warning
    assert_eq!(output.matches("retrying").count(), 2);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let store = food_store().corrupt(1);

    let outcome = retriever_with(5, 10)
        .retrieve_context(FOOD_QUESTION, Some(&store), "delhi")
        .await;

    assert_eq!(outcome.context, "");
    assert_eq!(store.scans(), 1);
}

#[tokio::test]
async fn failures_are_not_memoized() {
    let store = food_store().failing(3);
    let r = retriever_with(3, 1);

    let first = r.retrieve_context(FOOD_QUESTION, Some(&store), "delhi").await;
    assert_eq!(first.context, "");

    let second = r.retrieve_context(FOOD_QUESTION, Some(&store), "delhi").await;
    assert_eq!(second.context, "delhi:food:k1 - v1\ndelhi:food:k2 - v2");
    assert_eq!(store.scans(), 4);
}

#[tokio::test]
async fn operation_timeout_counts_as_transient_failure() {
    let slow = food_store().with_latency(Duration::from_millis(200));
    let bounded = BoundedStore::new(slow, 4, Duration::from_millis(20));

    let outcome = retriever_with(2, 1)
        .retrieve_context(FOOD_QUESTION, Some(&bounded), "delhi")
        .await;

    assert_eq!(outcome.context, "");
    assert_eq!(bounded.inner().scans(), 2);
}

// ============================================================================
// Memoization
// ============================================================================

#[tokio::test]
async fn repeated_lookup_is_served_from_cache() {
    let store = food_store();
    let r = retriever();

    let first = r.retrieve_context(FOOD_QUESTION, Some(&store), "delhi").await;
    let (scans, gets) = (store.scans(), store.gets());

    let second = r.retrieve_context(FOOD_QUESTION, Some(&store), "delhi").await;
    assert_eq!(second.context, first.context);
    assert_eq!(store.scans(), scans);
    assert_eq!(store.gets(), gets);

    let stats = r.cache_stats().unwrap();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn cache_is_scoped_to_store_identity() {
    let a = food_store();
    let b = ScriptedStore::new(&[("delhi:food:other", "elsewhere")]);
    let r = retriever();

    let from_a = r.retrieve_context(FOOD_QUESTION, Some(&a), "delhi").await;
    let from_b = r.retrieve_context(FOOD_QUESTION, Some(&b), "delhi").await;

    assert_ne!(from_a.context, from_b.context);
    assert_eq!(b.scans(), 1);
}

#[tokio::test]
async fn zero_capacity_disables_memoization() {
    let store = food_store();
    let config = RetrievalConfig {
        cache_capacity: 0,
        ..RetrievalConfig::default()
    };
    let r = ContextRetriever::from_config(&config).unwrap();

    r.retrieve_context(FOOD_QUESTION, Some(&store), "delhi").await;
    r.retrieve_context(FOOD_QUESTION, Some(&store), "delhi").await;

    assert_eq!(store.scans(), 2);
    assert!(r.cache_stats().is_none());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn concurrent_retrievals_overlap() {
    let latency = Duration::from_millis(200);
    let store = Arc::new(food_store().with_latency(latency));
    let r = Arc::new(retriever());
    let started = Instant::now();

    let (food, history) = tokio::join!(
        r.retrieve_context(FOOD_QUESTION, Some(store.as_ref()), "delhi"),
        r.retrieve_context(HISTORY_QUESTION, Some(store.as_ref()), "delhi"),
    );

    assert_eq!(food.context, "delhi:food:k1 - v1\ndelhi:food:k2 - v2");
    assert_eq!(history.context, "delhi:history:fort - Built in 1648");
    // Serialized execution would take at least 2 * latency
    assert!(started.elapsed() < latency * 2);
}

#[tokio::test]
async fn connection_bound_serializes_store_calls() {
    let latency = Duration::from_millis(100);
    let bounded = BoundedStore::new(
        food_store().with_latency(latency),
        1,
        Duration::from_secs(5),
    );
    let r = retriever();
    let started = Instant::now();

    let (food, history) = tokio::join!(
        r.retrieve_context(FOOD_QUESTION, Some(&bounded), "delhi"),
        r.retrieve_context(HISTORY_QUESTION, Some(&bounded), "delhi"),
    );

    assert!(!food.context.is_empty());
    assert!(!history.context.is_empty());
    assert!(started.elapsed() >= latency * 2);
}
