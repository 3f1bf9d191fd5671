//! Redis-style glob key patterns
//!
//! Supported syntax: `*` (any run of characters), `?` (any single character),
//! `[abc]` / `[a-z]` / `[^a]` (character classes), and `\x` (literal `x`).
//! Patterns are compiled to an anchored regex once per scan call.

use regex::Regex;

use super::StoreError;

/// Characters with glob meaning that must be escaped inside a literal segment.
const GLOB_META: &[char] = &['*', '?', '[', ']', '\\'];

/// Escape a literal key segment so it matches only itself inside a pattern.
pub fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if GLOB_META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
    prefix: String,
}

impl KeyPattern {
    /// Compile a glob into an anchored matcher.
    pub fn compile(pattern: &str) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut re = String::with_capacity(pattern.len() * 2 + 2);
        let mut prefix = String::new();
        let mut prefix_open = true;
        // `*` and `?` must also match newlines in keys
        re.push_str("(?s)^");

        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    prefix_open = false;
                    re.push_str(".*");
                }
                '?' => {
                    prefix_open = false;
                    re.push('.');
                }
                '[' => {
                    prefix_open = false;
                    re.push('[');
                    if matches!(chars.peek(), Some('^') | Some('!')) {
                        chars.next();
                        re.push('^');
                    }
                    let mut closed = false;
                    let mut empty = true;
                    while let Some(cc) = chars.next() {
                        match cc {
                            ']' if !empty => {
                                closed = true;
                                break;
                            }
                            '\\' => {
                                let lit = chars.next().ok_or_else(|| invalid("dangling escape"))?;
                                re.push_str(&regex::escape(&lit.to_string()));
                            }
                            '-' if !empty && chars.peek().is_some_and(|n| *n != ']') => {
                                re.push('-');
                            }
                            other => re.push_str(&regex::escape(&other.to_string())),
                        }
                        empty = false;
                    }
                    if !closed {
                        return Err(invalid("unclosed character class"));
                    }
                    re.push(']');
                }
                '\\' => {
                    let lit = chars.next().ok_or_else(|| invalid("dangling escape"))?;
                    if prefix_open {
                        prefix.push(lit);
                    }
                    re.push_str(&regex::escape(&lit.to_string()));
                }
                other => {
                    if prefix_open {
                        prefix.push(other);
                    }
                    re.push_str(&regex::escape(&other.to_string()));
                }
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self { regex, prefix })
    }

    /// Whether `key` matches the whole pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The literal text every matching key starts with.
    pub fn literal_prefix(&self) -> &str {
        &self.prefix
    }
}
