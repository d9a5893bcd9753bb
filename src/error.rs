//! Error types for db-insight.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for db-insight operations.
#[derive(Error, Debug)]
pub enum InsightError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query errors (syntax errors, refused statements, timeouts, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Hosted LLM service errors (rate limits, auth, malformed responses, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Credential acquisition errors (missing API key, Azure CLI not logged in, etc.)
    #[error("Credential error: {0}")]
    Credential(String),

    /// Configuration errors (invalid config file, empty question, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InsightError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a credential error with the given message.
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Credential(_) => "Credential Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using InsightError.
pub type Result<T> = std::result::Result<T, InsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_query() {
        let err = InsightError::query("refusing to run DELETE");
        assert_eq!(err.to_string(), "Query error: refusing to run DELETE");
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_error_display_llm() {
        let err = InsightError::llm("Rate limited. Please wait.");
        assert_eq!(err.to_string(), "LLM error: Rate limited. Please wait.");
        assert_eq!(err.category(), "LLM Error");
    }

    #[test]
    fn test_error_display_credential() {
        let err = InsightError::credential("Azure CLI is not logged in");
        assert_eq!(
            err.to_string(),
            "Credential error: Azure CLI is not logged in"
        );
        assert_eq!(err.category(), "Credential Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = InsightError::config("question must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: question must not be empty"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_categories_are_distinct() {
        let categories = [
            InsightError::connection("").category(),
            InsightError::query("").category(),
            InsightError::llm("").category(),
            InsightError::credential("").category(),
            InsightError::config("").category(),
            InsightError::internal("").category(),
        ];
        for (i, a) in categories.iter().enumerate() {
            for b in &categories[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InsightError>();
    }
}
