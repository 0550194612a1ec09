//! Error and outcome types for amendment extraction.
//!
//! Extraction distinguishes three kinds of "no amendment":
//! - [`ExtractionMiss`]: the expected, frequent case where an email does
//!   not describe a recognizable amendment. Not an error.
//! - [`ValidationError`](amendment_core::ValidationError): a complete
//!   candidate violates an amendment invariant; returned as `Err`.
//! - [`ProviderError`]: the AI completion transport failed; the factory
//!   falls back to rule-based extraction.

use std::fmt;

use amendment_core::ValidationError;
use thiserror::Error;

/// Non-exceptional "no amendment produced" outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionMiss {
    /// A required field (`submitter_delegate` or `clause`) was not found.
    MissingField(&'static str),
    /// The AI response was an empty object.
    EmptyResponse,
    /// The AI response was not a JSON object, or its fields had the wrong
    /// shape.
    MalformedResponse(String),
}

impl fmt::Display for ExtractionMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field: {field}"),
            Self::EmptyResponse => write!(f, "empty extraction response"),
            Self::MalformedResponse(detail) => write!(f, "malformed extraction response: {detail}"),
        }
    }
}

/// Failure of the external AI completion capability.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider command could not be started.
    #[error("failed to start provider command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// Pipe I/O with the provider failed.
    #[error("provider I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The provider did not answer in time and was killed.
    #[error("provider timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The provider exited unsuccessfully.
    #[error("provider exited with status {status}: {stderr}")]
    Failed { status: String, stderr: String },
    /// No command configured.
    #[error("provider command is empty")]
    NotConfigured,
}

/// Why a strategy produced neither an amendment nor a miss.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The candidate was complete but breaks an amendment invariant.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The AI provider could not be reached.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Failure turning raw message bytes into an email.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The message is not parseable as RFC 822 / MIME.
    #[error("mail parse error: {0}")]
    Mail(#[from] mailparse::MailParseError),
}

/// Configuration load/save failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A value is outside its accepted range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_display() {
        assert_eq!(
            ExtractionMiss::MissingField("clause").to_string(),
            "missing required field: clause"
        );
        assert_eq!(
            ExtractionMiss::EmptyResponse.to_string(),
            "empty extraction response"
        );
    }

    #[test]
    fn test_strategy_error_is_transparent() {
        let err = StrategyError::from(ValidationError::StrikeWithText);
        assert_eq!(err.to_string(), ValidationError::StrikeWithText.to_string());
    }

    #[test]
    fn test_provider_timeout_display() {
        assert_eq!(
            ProviderError::Timeout { timeout_ms: 250 }.to_string(),
            "provider timed out after 250 ms"
        );
    }
}
