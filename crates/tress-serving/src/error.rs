//! Serving-layer error types
//!
//! Everything a request can fail with, folded into one enum the
//! embedding service can branch on. The `retry_possible` flag is part
//! of the surfaced contract: fatal model errors carry `false`, transient
//! conditions carry `true`.

use crate::provider::ProviderError;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tress_inference::ModelError;

/// Serving error types
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServingError {
    /// The local model failed and no escalation was applicable
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The caller exhausted its request quota for the current window
    #[error("rate limit exceeded for {identifier}: {current}/{limit}, resets at {reset_at}")]
    RateLimited {
        identifier: String,
        current: u64,
        limit: u64,
        reset_at: DateTime<Utc>,
    },

    /// The external provider path failed (and no local result stands in)
    #[error("external provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The local attempt failed, escalation was tried, and it failed too.
    /// Carries the original local error as the source.
    #[error("local inference failed, fallback attempted: {source} (provider: {provider_error})")]
    FallbackExhausted {
        #[source]
        source: ModelError,
        provider_error: String,
    },
}

/// Result type for serving operations
pub type ServingResult<T> = Result<T, ServingError>;

impl ServingError {
    /// Whether retrying the request could plausibly succeed
    pub fn retry_possible(&self) -> bool {
        match self {
            ServingError::Model(e) => e.retry_possible(),
            // Quota windows close; the caller can come back
            ServingError::RateLimited { .. } => true,
            ServingError::Provider(_) => true,
            ServingError::FallbackExhausted { source, .. } => source.retry_possible(),
        }
    }

    /// Whether an escalation to the external provider was attempted
    /// before this error surfaced
    pub fn fallback_attempted(&self) -> bool {
        matches!(self, ServingError::FallbackExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_passthrough() {
        let err = ServingError::from(ModelError::ModelNotFound { path: "/m".into() });
        assert!(!err.retry_possible());
        assert!(!err.fallback_attempted());

        let err = ServingError::from(ModelError::Inference("transient".into()));
        assert!(err.retry_possible());
    }

    #[test]
    fn test_rate_limited_display_and_retry() {
        let err = ServingError::RateLimited {
            identifier: "caller-1".into(),
            current: 6,
            limit: 5,
            reset_at: Utc::now(),
        };
        assert!(err.to_string().contains("caller-1"));
        assert!(err.to_string().contains("6/5"));
        assert!(err.retry_possible());
    }

    #[test]
    fn test_fallback_exhausted_keeps_original_cause() {
        let err = ServingError::FallbackExhausted {
            source: ModelError::Inference("nan in logits".into()),
            provider_error: "submit failed: 503".into(),
        };
        assert!(err.fallback_attempted());
        assert!(err.retry_possible());
        assert!(err.to_string().contains("fallback attempted"));
        assert!(err.to_string().contains("nan in logits"));

        let source = std::error::Error::source(&err).expect("source preserved");
        assert!(source.to_string().contains("nan in logits"));
    }
}
