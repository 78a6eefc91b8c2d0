//! Error types for the naturalness utility.

use thiserror::Error;

/// Result type alias using NaturalnessError.
pub type NaturalnessResult<T> = Result<T, NaturalnessError>;

/// Primary error type shared by the estimator, provider and aggregator.
///
/// `Validation` and `Interaction` are the two failures a caller can observe;
/// the remaining variants surface as internal errors.
#[derive(Debug, Error)]
pub enum NaturalnessError {
    /// Recoverable, caller-fixable failure (oversized area, bad statistic, ...).
    #[error("{0}")]
    Validation(String),

    /// The upstream imagery provider could not be reached or refused the request.
    #[error("{0}")]
    Interaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to decode raster: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NaturalnessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn interaction(msg: impl Into<String>) -> Self {
        Self::Interaction(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the caller can fix the request and try again.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationFailure",
            Self::Interaction(_) => "InteractionFailure",
            Self::Configuration(_) => "ConfigurationError",
            Self::Storage(_) => "StorageError",
            Self::Decode(_) => "DecodeError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::Interaction(_) => 503,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for NaturalnessError {
    fn from(err: std::io::Error) -> Self {
        NaturalnessError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for NaturalnessError {
    fn from(err: serde_json::Error) -> Self {
        NaturalnessError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(NaturalnessError::validation("too big").http_status_code(), 422);
        assert_eq!(NaturalnessError::interaction("down").http_status_code(), 503);
        assert_eq!(NaturalnessError::storage("disk").http_status_code(), 500);
    }

    #[test]
    fn test_validation_message_is_reason() {
        let err = NaturalnessError::validation("Start date must be before end date");
        assert_eq!(err.to_string(), "Start date must be before end date");
        assert!(err.is_validation());
        assert_eq!(err.kind(), "ValidationFailure");
    }
}
