//! Error types for the triage engine

use thiserror::Error;

/// Main error type for collaborator and infrastructure failures
#[derive(Error, Debug)]
pub enum Error {
    /// The similarity index could not be reached
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The similarity index holds no records
    #[error("Index is empty")]
    EmptyIndex,

    /// The relationship graph could not be queried
    #[error("Graph unavailable: {0}")]
    GraphUnavailable(String),

    /// A collaborator did not answer in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The generative reasoning service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    EmbeddingProvider(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for triage operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a service-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// Check if this is a temporary error that can be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ServiceUnavailable(_))
    }
}

/// Per-stage failure inside the decision pipeline.
///
/// These never leave the engine: each one selects a fallback path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriageFailure {
    /// An upstream source was unreachable, unavailable or timed out
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        /// Which source failed
        source_name: &'static str,
        /// Why it failed
        reason: String,
    },

    /// The reasoning service answered without an interpretable urgency
    #[error("could not interpret reasoning output")]
    ParseFailure,

    /// No symptom tokens and no source matched
    #[error("insufficient evidence")]
    InsufficientEvidence,
}

impl TriageFailure {
    /// Create a source failure
    pub fn unavailable(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::EmptyIndex.to_string(), "Index is empty");
        let err = Error::GraphUnavailable("not loaded".to_string());
        assert_eq!(err.to_string(), "Graph unavailable: not loaded");
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Timeout("llm".into()).is_retryable());
        assert!(Error::unavailable("down").is_retryable());
        assert!(!Error::validation("empty").is_retryable());
        assert!(!Error::EmptyIndex.is_retryable());
    }

    #[test]
    fn test_failure_display() {
        let failure = TriageFailure::unavailable("graph", "timed out");
        assert_eq!(failure.to_string(), "graph unavailable: timed out");
    }

    #[test]
    fn test_error_from_traits() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
