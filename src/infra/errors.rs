// src/infra/errors.rs — Error types for sqlbuddy

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlBuddyError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    // Degradable errors: callers turn these into empty context
    #[error("Retrieval backend unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("{tier} memory unavailable: {message}")]
    MemoryUnavailable { tier: String, message: String },

    #[error("{tier} memory write failed: {message}")]
    MemoryWriteFailed { tier: String, message: String },

    // Request-terminating errors
    #[error("SQL syntax error: {0}")]
    SqlSyntax(String),

    #[error("SQL execution error: {0}")]
    SqlExecution(String),

    #[error("Generation failed during {stage}: {message}")]
    GenerationFailed { stage: String, message: String },

    // Infra
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SqlBuddyError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SqlBuddyError::Provider {
                retriable: true,
                ..
            } | SqlBuddyError::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_provider() {
        let err = SqlBuddyError::Provider {
            provider: "openai".into(),
            message: "HTTP 503".into(),
            retriable: true,
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn test_timeout_not_retriable() {
        let err = SqlBuddyError::Timeout {
            operation: "generate".into(),
            after_ms: 100,
        };
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "generate timed out after 100ms");
    }
}
