//! Error types for document retrieval and caching
//!
//! One variant per failure category: reference validation, provider
//! selection, provider fetch failures (not found, timeout, size, transport),
//! and on-disk persistence.

use thiserror::Error;

/// Main error type for codex operations
#[derive(Error, Debug)]
pub enum CodexError {
    /// Malformed or unsafe `codex://` URI. Never retried.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// No registered provider is able to handle the reference
    #[error("No storage provider can handle reference: {uri}")]
    Unhandled { uri: String },

    /// The document does not exist in the backing store
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A network-backed fetch exceeded its time budget
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// Content exceeded the configured byte ceiling
    #[error("Content too large: {size} bytes exceeds limit of {max_size} bytes")]
    TooLarge { size: u64, max_size: u64 },

    /// Network or protocol failure talking to a remote backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Reading or writing the on-disk cache failed
    #[error("Cache persistence error: {0}")]
    PersistenceIo(#[from] std::io::Error),

    /// Metadata sidecar or provider payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every eligible provider failed; displays the first failure
    #[error("{first}")]
    AllProvidersFailed {
        first: Box<CodexError>,
        attempts: Vec<ProviderFailure>,
    },
}

/// One failed provider attempt, kept for diagnostics on the aggregate error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name (`local`, `github`, `http`)
    pub provider: String,
    /// Rendered error message
    pub message: String,
}

/// Result type alias for codex operations
pub type Result<T> = std::result::Result<T, CodexError>;

impl CodexError {
    /// Whether retrying the same operation later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CodexError::Timeout { .. } | CodexError::Transport(_) => true,
            CodexError::AllProvidersFailed { first, .. } => first.is_retryable(),
            _ => false,
        }
    }

    /// Whether this error means the document is absent rather than unreachable
    pub fn is_not_found(&self) -> bool {
        match self {
            CodexError::NotFound(_) => true,
            CodexError::AllProvidersFailed { first, .. } => first.is_not_found(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CodexError {
    fn from(e: serde_json::Error) -> Self {
        CodexError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for CodexError {
    fn from(e: reqwest::Error) -> Self {
        CodexError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CodexError::NotFound("codex://acme/docs/api.md".to_string());
        assert_eq!(error.to_string(), "Document not found: codex://acme/docs/api.md");

        let timeout_error = CodexError::Timeout {
            timeout_ms: 5000,
            context: "raw fetch".to_string(),
        };
        assert!(timeout_error.to_string().contains("timed out after 5000ms"));

        let too_large = CodexError::TooLarge {
            size: 2048,
            max_size: 1024,
        };
        assert!(too_large.to_string().contains("2048 bytes"));
    }

    #[test]
    fn test_aggregate_displays_first_failure() {
        let error = CodexError::AllProvidersFailed {
            first: Box::new(CodexError::NotFound("docs/a.md".to_string())),
            attempts: vec![
                ProviderFailure {
                    provider: "local".to_string(),
                    message: "Document not found: docs/a.md".to_string(),
                },
                ProviderFailure {
                    provider: "http".to_string(),
                    message: "Transport error: refused".to_string(),
                },
            ],
        };

        assert_eq!(error.to_string(), "Document not found: docs/a.md");
        assert!(error.is_not_found());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: CodexError = io.into();
        assert!(matches!(error, CodexError::PersistenceIo(_)));

        let json = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: CodexError = json.into();
        assert!(matches!(error, CodexError::Serialization(_)));
    }
}
