use std::time::Duration;
use thiserror::Error;

/// Error categorization for the search pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Environment error: {0}")]
    Environment(#[from] envy::Error),

    // Serialization errors (usually permanent)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Network errors (transient - should retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Option<Duration> },

    // Client errors (permanent - don't retry)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request rejected by {service}: HTTP {status}")]
    Rejected { service: String, status: u16 },

    // Server errors (transient - should retry)
    #[error("Service temporarily unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // Parse errors
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Provider errors
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Error categorization for retry strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry with backoff
    RateLimited,
}

impl Error {
    /// Categorize error for retry logic
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::Environment(_)
            | Self::InvalidInput { .. }
            | Self::AuthenticationFailed(_)
            | Self::Rejected { .. }
            | Self::Parse { .. }
            | Self::Serde(_)
            | Self::Cancelled => ErrorCategory::Permanent,

            Self::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            Self::Http(_)
            | Self::Network(_)
            | Self::ServiceUnavailable { .. }
            | Self::Timeout { .. }
            | Self::Provider(_) => ErrorCategory::Transient,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Get suggested retry delay for rate limited errors
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Shorthand for request validation failures
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// Provider error conversion
impl From<crate::client::providers::ProviderError> for Error {
    fn from(err: crate::client::providers::ProviderError) -> Self {
        use crate::client::providers::ProviderError;

        match err {
            ProviderError::Network(msg) => Self::Network(msg),
            ProviderError::Parse(msg) => Self::Parse {
                context: "provider".to_string(),
                message: msg,
            },
            ProviderError::RateLimit { retry_after } => Self::RateLimitExceeded { retry_after },
            ProviderError::Auth(msg) => Self::AuthenticationFailed(msg),
            ProviderError::Rejected { service, status } => Self::Rejected { service, status },
            ProviderError::InvalidQuery(msg) => Self::InvalidInput {
                field: "query".to_string(),
                reason: msg,
            },
            ProviderError::ServiceUnavailable { service, reason } => {
                Self::ServiceUnavailable { service, reason }
            }
            ProviderError::Other(msg) => Self::Provider(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::providers::ProviderError;

    #[test]
    fn test_permanent_errors_not_retryable() {
        assert!(!Error::invalid_input("limit", "must be positive").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::Rejected {
            service: "crossref".to_string(),
            status: 400
        }
        .is_retryable());
    }

    #[test]
    fn test_transient_errors_retryable() {
        assert!(Error::Timeout {
            timeout: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(Error::ServiceUnavailable {
            service: "arxiv".to_string(),
            reason: "HTTP 503".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_rate_limit_carries_hint() {
        let err: Error = ProviderError::RateLimit {
            retry_after: Some(Duration::from_secs(7)),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_auth_provider_error_is_permanent() {
        let err: Error = ProviderError::Auth("missing key".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
