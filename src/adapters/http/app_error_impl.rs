use crate::app_error::AppError;
use axum::Json;
use billing_types::ErrorCode;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidInput(_)
            | AppError::ProviderNotConfigured(_)
            | AppError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::ProviderRejected(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::LedgerConflict(_) => StatusCode::CONFLICT,
            AppError::QuotaDenied { .. } => StatusCode::FORBIDDEN,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Log the error before it gets converted into a status response.
        if status.is_server_error() {
            tracing::error!(error = ?self, status = %status, "Request failed");
        } else {
            tracing::warn!(error = ?self, status = %status, "Request rejected");
        }

        let code = self.code();
        let message = match self {
            AppError::Database(_) | AppError::Internal(_) => None,
            AppError::NotFound | AppError::Unauthorized => None,
            AppError::InvalidInput(msg)
            | AppError::ProviderNotConfigured(msg)
            | AppError::ProviderRejected(msg) => Some(msg),
            AppError::ProviderUnavailable(_) => {
                Some("Payment provider is temporarily unavailable. Please retry.".to_string())
            }
            AppError::ProviderTimeout => {
                Some("Payment provider did not answer in time. Please retry.".to_string())
            }
            AppError::InvalidSignature(_) => Some("Webhook signature rejected".to_string()),
            err @ (AppError::LedgerConflict(_)
            | AppError::QuotaDenied { .. }
            | AppError::QuotaExceeded { .. }) => Some(err.to_string()),
        };
        error_resp(status, code, message)
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
