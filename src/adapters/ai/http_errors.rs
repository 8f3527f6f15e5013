//! Shared HTTP error classification for provider adapters.
//!
//! Only overload-type failures are transient: 503/529 statuses, bodies announcing an
//! overloaded/unavailable model, client timeouts and connection failures.

use crate::domain::DomainError;
use reqwest::StatusCode;
use tracing::warn;

/// Map a non-success HTTP response to a provider error.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> DomainError {
    let lower = body.to_lowercase();
    let overloaded = matches!(status.as_u16(), 503 | 529)
        || lower.contains("overloaded")
        || body.contains("UNAVAILABLE");
    let snippet: String = body.chars().take(200).collect();
    warn!(
        provider,
        status = %status,
        transient = overloaded,
        body = %snippet,
        "provider API returned error"
    );

    let message = format!("API error {}: {}", status, snippet);
    if overloaded {
        DomainError::overloaded(provider, message)
    } else {
        DomainError::provider(provider, message)
    }
}

/// Map a transport-level failure to a provider error.
pub fn classify_transport(provider: &str, err: &reqwest::Error) -> DomainError {
    let message = format!("HTTP request failed: {}", err);
    if err.is_timeout() || err.is_connect() {
        DomainError::overloaded(provider, message)
    } else {
        DomainError::provider(provider, message)
    }
}
