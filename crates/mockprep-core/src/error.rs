//! Error types shared across the engine.
//!
//! `ProviderError` covers failures talking to an external scorer. It lives in
//! `mockprep-core` so the evaluation engine can downcast and classify errors
//! for retry decisions without string matching. `StoreError` is what a
//! transactional store reports, and `EngineError` is the taxonomy surfaced to
//! callers of the orchestrators.

use thiserror::Error;

/// Errors that can occur when interacting with an external scorer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Errors reported by a transactional store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A row referenced by the operation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The transaction was aborted and rolled back.
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

/// Errors surfaced by the engine's orchestrators.
///
/// Input and not-found errors are raised before any side effect. External
/// service and output validation errors are absorbed by fallbacks and only
/// reported for observability. Transaction errors are the only hard failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("external scorer failed: {0}")]
    ExternalService(String),

    #[error("scorer output invalid: {0}")]
    OutputValidation(String),

    #[error("transaction failed: {0}")]
    Transaction(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Stable machine-readable label for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InputValidation(_) => "input_validation",
            EngineError::NotFound(_) => "not_found",
            EngineError::ExternalService(_) => "external_service",
            EngineError::OutputValidation(_) => "output_validation",
            EngineError::Transaction(_) => "transaction",
            EngineError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_provider_errors() {
        assert!(ProviderError::AuthenticationFailed("bad key".into()).is_permanent());
        assert!(ProviderError::ModelNotFound("x".into()).is_permanent());
        assert!(!ProviderError::Timeout(30).is_permanent());
        assert_eq!(
            ProviderError::RateLimited {
                retry_after_ms: 2000
            }
            .retry_after_ms(),
            Some(2000)
        );
    }

    #[test]
    fn store_error_converts_to_transaction_error() {
        let err: EngineError = StoreError::Unavailable("disk full".into()).into();
        assert_eq!(err.kind(), "transaction");
        assert!(err.to_string().contains("disk full"));
    }
}
