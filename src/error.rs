//! Error types for Briefing Assist.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Conversation {session} is not active")]
    UnknownSession { session: String },
}

/// Structured-record extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed extraction output: {0}")]
    Malformed(String),

    #[error("Required fields missing from extraction: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Spreadsheet sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Spreadsheet endpoint is not configured")]
    NotConfigured,

    #[error("Dispatch to spreadsheet failed: {0}")]
    Dispatch(String),

    #[error("Spreadsheet endpoint rejected the record with status {status}")]
    Rejected { status: u16 },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_lists_every_field() {
        let err = ExtractionError::MissingFields(vec!["servidor_nome", "quando"]);
        assert_eq!(
            err.to_string(),
            "Required fields missing from extraction: servidor_nome, quando"
        );
    }

    #[test]
    fn sink_error_converts_into_top_level() {
        let err: Error = SinkError::Rejected { status: 500 }.into();
        assert!(matches!(err, Error::Sink(SinkError::Rejected { status: 500 })));
        assert!(err.to_string().contains("500"));
    }
}
