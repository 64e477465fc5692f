//! HTTP plumbing shared by the remote scorers.

use std::time::Duration;

use mockprep_core::error::ProviderError;

/// Build the reqwest client used by a scorer.
pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("failed to build HTTP client")
}

/// Classify a transport-level failure.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(e.to_string())
    }
}

/// Map non-success HTTP statuses to a [`ProviderError`].
///
/// `error_message` pulls a human-readable message out of a provider-specific
/// error body; the raw body is used when it returns `None`.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
    error_message: fn(&str) -> Option<String>,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after_secs * 1000,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or(body);
    Err(match status {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError { status, message },
    })
}

/// Failure to decode a success body.
pub(crate) fn decode_error(e: reqwest::Error) -> ProviderError {
    ProviderError::ApiError {
        status: 0,
        message: format!("failed to parse response: {e}"),
    }
}

/// Cost estimate from per-million-token prices.
pub(crate) fn estimate_cost(
    prompt_tokens: u32,
    completion_tokens: u32,
    input_per_million: f64,
    output_per_million: f64,
) -> f64 {
    (prompt_tokens as f64 * input_per_million + completion_tokens as f64 * output_per_million)
        / 1_000_000.0
}
