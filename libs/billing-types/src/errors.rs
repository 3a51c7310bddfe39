use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// API error codes returned in the `code` field of error responses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DatabaseError,
    InvalidInput,
    NotFound,
    Unauthorized,
    ProviderNotConfigured,
    ProviderUnavailable,
    ProviderTimeout,
    ProviderRejected,
    InvalidSignature,
    LedgerConflict,
    QuotaDenied,
    QuotaExceeded,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidInput => "INVALID_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::ProviderNotConfigured => "PROVIDER_NOT_CONFIGURED",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::ProviderRejected => "PROVIDER_REJECTED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::LedgerConflict => "LEDGER_CONFLICT",
            Self::QuotaDenied => "QUOTA_DENIED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether a client may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable | Self::ProviderTimeout | Self::DatabaseError
        )
    }
}

/// Raw limit decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("Invalid limit value: {0}")]
    Invalid(String),
}
