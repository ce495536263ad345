//! Why entries leave the cache, and URI pattern matching for bulk invalidation

use crate::error::{CodexError, Result};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason an entry was removed from memory or disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Explicit invalidation of one URI
    Manual,

    /// Matched a bulk invalidation pattern
    PatternMatch { pattern: String },

    /// Swept after `expires_at`
    Expired,

    /// Whole cache cleared
    Cleared,

    /// Evicted from memory by the entry-count limit
    CountLimit,

    /// Evicted from memory by the byte limit
    SizeLimit,

    /// Stored content no longer matched its hash
    Corrupt,
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::PatternMatch { pattern } => {
                write!(f, "pattern match: {}", pattern)
            }
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Cleared => write!(f, "cache cleared"),
            InvalidationReason::CountLimit => write!(f, "entry limit reached"),
            InvalidationReason::SizeLimit => write!(f, "size limit reached"),
            InvalidationReason::Corrupt => write!(f, "content hash mismatch"),
        }
    }
}

/// Glob pattern over full URIs (`codex://acme/*`, `codex://*/handbook/docs/**`).
/// `*` also matches across `/`.
#[derive(Debug, Clone)]
pub struct UriPattern {
    source: String,
    pattern: Pattern,
}

impl UriPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| {
            CodexError::Config(format!("invalid invalidation pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
        })
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.pattern.matches_with(
            uri,
            MatchOptions {
                case_sensitive: true,
                require_literal_separator: false,
                require_literal_leading_dot: false,
            },
        )
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn reason(&self) -> InvalidationReason {
        InvalidationReason::PatternMatch {
            pattern: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display() {
        assert_eq!(InvalidationReason::Expired.to_string(), "TTL expired");
        assert_eq!(
            InvalidationReason::PatternMatch {
                pattern: "codex://acme/*".to_string()
            }
            .to_string(),
            "pattern match: codex://acme/*"
        );
        assert_eq!(InvalidationReason::Corrupt.to_string(), "content hash mismatch");
    }

    #[test]
    fn test_pattern_crosses_separators() {
        let pattern = UriPattern::new("codex://acme/*").unwrap();
        assert!(pattern.matches("codex://acme/handbook/docs/api.md"));
        assert!(!pattern.matches("codex://other/handbook/docs/api.md"));
    }

    #[test]
    fn test_pattern_suffix_and_classes() {
        let md = UriPattern::new("codex://*/handbook/**/*.md").unwrap();
        assert!(md.matches("codex://acme/handbook/docs/api.md"));
        assert!(!md.matches("codex://acme/handbook/docs/api.json"));

        let versions = UriPattern::new("codex://acme/handbook/v[12]/*").unwrap();
        assert!(versions.matches("codex://acme/handbook/v1/a.md"));
        assert!(!versions.matches("codex://acme/handbook/v3/a.md"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            UriPattern::new("codex://acme/[unclosed"),
            Err(CodexError::Config(_))
        ));
    }
}
