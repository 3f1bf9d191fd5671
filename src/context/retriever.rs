//! Contextual retrieval orchestrator
//!
//! `Validating → Classifying → (NoContext | Retrieving) → Formatting → Done`
//!
//! Every path returns a `RetrievalOutcome`; nothing here can fail the chat
//! request. Failures degrade to an empty context and are logged with the
//! phase they happened in.

use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::{CacheStats, Entries, ScanCache, ScanKey};
use super::classifier::{Category, CategoryClassifier, ClassifyError, KeywordClassifier};
use super::retry::{retry_transient, RetryPolicy};
use super::scanner::scan_and_fetch;
use super::timer::Timer;
use crate::config::RetrievalConfig;
use crate::store::{escape_segment, KeyValueStore};

/// Result of one retrieval, including the short-circuit paths
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    /// Newline-joined `key - value` lines, empty when nothing was retrieved
    pub context: String,
    /// Category identification time (ms)
    pub cit_ms: f64,
    /// Data retrieval time (ms)
    pub drt_ms: f64,
    /// `None` when validation or classification failed
    pub category: Option<Category>,
}

impl RetrievalOutcome {
    fn empty() -> Self {
        Self {
            context: String::new(),
            cit_ms: 0.0,
            drt_ms: 0.0,
            category: None,
        }
    }
}

/// Build the scan pattern `{personality}:{category}:*`.
///
/// Both segments are glob-escaped so neither can widen the scan.
pub fn key_pattern(personality: &str, category: &str) -> String {
    format!("{}:{}:*", escape_segment(personality), escape_segment(category))
}

/// Render entries as `key - value` lines.
pub fn format_entries(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("{k} - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A key segment must be non-blank and stay inside its own namespace.
fn valid_segment(segment: &str) -> bool {
    !segment.trim().is_empty() && !segment.contains(':')
}

/// Classifies questions and pulls matching persona context from a store
pub struct ContextRetriever {
    classifier: Arc<dyn CategoryClassifier>,
    cache: Option<ScanCache>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl ContextRetriever {
    pub fn new(classifier: Arc<dyn CategoryClassifier>, config: &RetrievalConfig) -> Self {
        Self {
            classifier,
            cache: ScanCache::with_capacity(config.cache_capacity),
            retry: RetryPolicy::new(config.max_retries, config.backoff_base()),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Retriever using the configured keyword rules
    pub fn from_config(config: &RetrievalConfig) -> Result<Self, ClassifyError> {
        let classifier = KeywordClassifier::new(&config.categories, config.max_question_chars)?;
        Ok(Self::new(Arc::new(classifier), config))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ScanCache::stats)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Produce the context block for `question` under `personality`.
    pub async fn retrieve_context(
        &self,
        question: &str,
        store: Option<&dyn KeyValueStore>,
        personality: &str,
    ) -> RetrievalOutcome {
        // Validating
        let personality = personality.trim();
        let store = match store {
            Some(store) if !question.trim().is_empty() && valid_segment(personality) => store,
            _ => {
                debug!(
                    has_store = store.is_some(),
                    personality,
                    "Skipping context retrieval: invalid input"
                );
                return RetrievalOutcome::empty();
            }
        };

        // Classifying
        let mut cit_ms = 0.0;
        let classified = {
            let _timer = Timer::scoped(&mut cit_ms);
            self.classifier.classify(question)
        };

        let category = match classified {
            Ok(Category::Tagged(tag)) if valid_segment(&tag) => tag,
            Ok(Category::Tagged(tag)) => {
                warn!(
                    phase = "classify",
                    classifier = self.classifier.classifier_name(),
                    category = %tag,
                    "Classifier returned an unusable category, continuing without context"
                );
                return RetrievalOutcome {
                    cit_ms,
                    ..RetrievalOutcome::empty()
                };
            }
            Ok(Category::NoContext) => {
                debug!(personality, cit_ms, "No contextual lookup needed");
                return RetrievalOutcome {
                    cit_ms,
                    category: Some(Category::NoContext),
                    ..RetrievalOutcome::empty()
                };
            }
            Err(e) => {
                warn!(
                    phase = "classify",
                    classifier = self.classifier.classifier_name(),
                    error = %e,
                    "Category identification failed, continuing without context"
                );
                return RetrievalOutcome {
                    cit_ms,
                    ..RetrievalOutcome::empty()
                };
            }
        };

        // Retrieving
        let pattern = key_pattern(personality, &category);
        let mut drt_ms = 0.0;
        let entries = {
            let _timer = Timer::scoped(&mut drt_ms);
            self.lookup(store, &pattern).await
        };

        // Formatting
        let context = format_entries(&entries);
        debug!(
            personality,
            category = %category,
            pattern = %pattern,
            store = store.store_name(),
            entries = entries.len(),
            cit_ms,
            drt_ms,
            "Context retrieved"
        );

        RetrievalOutcome {
            context,
            cit_ms,
            drt_ms,
            category: Some(Category::Tagged(category)),
        }
    }

    /// Serve from the scan cache, else scan+fetch with retries.
    async fn lookup(&self, store: &dyn KeyValueStore, pattern: &str) -> Entries {
        let key = ScanKey::new(store.identity(), pattern, self.batch_size);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(pattern, entries = hit.len(), "Scan cache hit");
            return hit;
        }

        let batch_size = self.batch_size;
        let fetched = retry_transient(&self.retry, "scan_and_fetch", move |attempt| {
            debug!(pattern, attempt, "Scanning context store");
            scan_and_fetch(store, pattern, batch_size)
        })
        .await;

        match fetched {
            Ok(entries) => {
                let entries = Arc::new(entries);
                if let Some(cache) = &self.cache {
                    cache.insert(key, Arc::clone(&entries));
                }
                entries
            }
            // Already logged by the retry controller; failures are not cached.
            Err(_) => Arc::new(Vec::new()),
        }
    }
}
