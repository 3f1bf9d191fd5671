//! Question category classification
//!
//! Decides whether a question needs persona context and, if so, which topic
//! namespace to scan. The orchestrator only depends on the
//! `CategoryClassifier` trait, so the keyword rules here can be swapped for
//! any other strategy.

use regex::Regex;
use std::fmt;

use crate::config::CategoryRule;

/// Topic tag for a question
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// Scan entries stored under this tag
    Tagged(String),
    /// The question does not need contextual lookup
    NoContext,
}

impl Category {
    pub fn tag(&self) -> Option<&str> {
        match self {
            Category::Tagged(tag) => Some(tag),
            Category::NoContext => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Tagged(tag) => write!(f, "{tag}"),
            Category::NoContext => write!(f, "no-context"),
        }
    }
}

/// Classification errors
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("question is {len} characters, limit is {max}")]
    QuestionTooLong { len: usize, max: usize },
    #[error("invalid rule for category '{category}': {reason}")]
    InvalidRule { category: String, reason: String },
}

/// Strategy mapping a question to a category
///
/// Implementations must be deterministic: the same question always yields the
/// same category.
pub trait CategoryClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Result<Category, ClassifyError>;

    /// Get the classifier name for logging
    fn classifier_name(&self) -> &'static str;
}

struct CompiledRule {
    category: String,
    matcher: Regex,
}

/// Ordered keyword rules; the first rule with a whole-word hit wins.
pub struct KeywordClassifier {
    rules: Vec<CompiledRule>,
    max_question_chars: usize,
}

impl KeywordClassifier {
    pub fn new(rules: &[CategoryRule], max_question_chars: usize) -> Result<Self, ClassifyError> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if rule.name.trim().is_empty() || rule.name.contains(':') {
                return Err(ClassifyError::InvalidRule {
                    category: rule.name.clone(),
                    reason: "name must be non-blank and must not contain ':'".to_string(),
                });
            }

            let keywords: Vec<String> = rule
                .keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(regex::escape)
                .collect();
            if keywords.is_empty() {
                tracing::warn!(category = %rule.name, "Category has no keywords, it will never match");
                continue;
            }

            let source = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
            let matcher = Regex::new(&source).map_err(|e| ClassifyError::InvalidRule {
                category: rule.name.clone(),
                reason: e.to_string(),
            })?;
            compiled.push(CompiledRule {
                category: rule.name.clone(),
                matcher,
            });
        }

        Ok(Self {
            rules: compiled,
            max_question_chars,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl CategoryClassifier for KeywordClassifier {
    fn classify(&self, question: &str) -> Result<Category, ClassifyError> {
        let len = question.chars().count();
        if len > self.max_question_chars {
            return Err(ClassifyError::QuestionTooLong {
                len,
                max: self.max_question_chars,
            });
        }

        Ok(self
            .rules
            .iter()
            .find(|rule| rule.matcher.is_match(question))
            .map_or(Category::NoContext, |rule| {
                Category::Tagged(rule.category.clone())
            }))
    }

    fn classifier_name(&self) -> &'static str {
        "Keyword"
    }
}
