use billing_types::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Payment provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Payment provider timed out")]
    ProviderTimeout,

    #[error("Payment provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Ledger conflict: {0}")]
    LedgerConflict(String),

    #[error("Category '{category}' is not included in your plan. Upgrade to unlock it.")]
    QuotaDenied { category: String },

    #[error("You have used your allowance of {limit} for category '{category}'")]
    QuotaExceeded { category: String, limit: u32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::ProviderNotConfigured(_) => ErrorCode::ProviderNotConfigured,
            AppError::ProviderUnavailable(_) => ErrorCode::ProviderUnavailable,
            AppError::ProviderTimeout => ErrorCode::ProviderTimeout,
            AppError::ProviderRejected(_) => ErrorCode::ProviderRejected,
            AppError::InvalidSignature(_) => ErrorCode::InvalidSignature,
            AppError::LedgerConflict(_) => ErrorCode::LedgerConflict,
            AppError::QuotaDenied { .. } => ErrorCode::QuotaDenied,
            AppError::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Transient provider failures. The ledger entry stays pending and the
    /// call may be repeated.
    pub fn is_retryable_provider_error(&self) -> bool {
        matches!(
            self,
            AppError::ProviderUnavailable(_) | AppError::ProviderTimeout
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
