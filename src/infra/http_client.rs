//! HTTP client factory with consistent timeout configuration.
//!
//! Provider clients are built here rather than with `reqwest::Client::new()`
//! so that every outbound call carries connect and request timeouts.

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::app_error::AppError;

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (total request/response time).
///
/// Checkout additionally wraps each provider call in its own, usually
/// shorter, `tokio::time::timeout`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an HTTP client with default timeouts.
pub fn try_build_client() -> Result<Client, reqwest::Error> {
    build_client_with_timeout(DEFAULT_REQUEST_TIMEOUT)
}

/// Build an HTTP client whose request timeout is `timeout`.
pub fn build_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
}

/// Transport failures are transient: the payment may or may not have been
/// opened, so callers leave the ledger entry pending.
pub fn map_transport_error(provider: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        tracing::warn!(provider, error = %e, "Provider request timed out");
        AppError::ProviderTimeout
    } else {
        tracing::warn!(provider, error = %e, "Provider request failed");
        AppError::ProviderUnavailable(format!("{} request failed: {}", provider, e))
    }
}

/// Map a non-success provider status onto the provider error taxonomy.
pub fn classify_status(provider: &str, status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::ProviderNotConfigured(
            format!("{} credentials rejected: {}", provider, message),
        ),
        StatusCode::NOT_FOUND => AppError::NotFound,
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            AppError::ProviderUnavailable(format!("{} {}: {}", provider, s, message))
        }
        _ => AppError::ProviderRejected(message),
    }
}
