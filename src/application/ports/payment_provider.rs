use async_trait::async_trait;
use billing_types::SettlementStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{payment_provider::PaymentProvider, payment_scenario::PaymentScenario},
};

// ============================================================================
// Port Types - Provider-agnostic domain types
// ============================================================================

/// Identifier a payment provider assigns to (or accepts for) one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRef(pub String);

impl ProviderRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything an adapter needs to open a hosted payment page.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    /// Local ledger id, also used as idempotency key / merchant reference
    pub transaction_id: Uuid,
    pub subscriber_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub amount_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    /// Honoured by the dummy provider only
    pub scenario: Option<PaymentScenario>,
}

/// Result of a successful initiation. Always carries a usable checkout URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitiatedPayment {
    pub provider_ref: ProviderRef,
    pub checkout_url: String,
}

impl InitiatedPayment {
    /// Build from a provider response, rejecting responses without a redirect target.
    pub fn from_response(
        provider_ref: impl Into<String>,
        checkout_url: Option<String>,
    ) -> AppResult<Self> {
        let provider_ref = provider_ref.into();
        if provider_ref.trim().is_empty() {
            return Err(AppError::ProviderRejected(
                "missing payment reference".to_string(),
            ));
        }
        match checkout_url {
            Some(url) if !url.trim().is_empty() => Ok(Self {
                provider_ref: ProviderRef(provider_ref),
                checkout_url: url,
            }),
            _ => Err(AppError::ProviderRejected("missing checkout url".to_string())),
        }
    }
}

/// Raw inbound callback as received over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub raw: String,
    /// Value of the provider's signature header, if present
    pub signature: Option<String>,
}

/// Webhook reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWebhook {
    pub provider_ref: ProviderRef,
    pub status: SettlementStatus,
    pub raw_event_type: String,
}

// ============================================================================
// Payment Provider Port
// ============================================================================

/// Payment provider port. Adapters never touch the ledger.
#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Open a hosted payment page for one ledger transaction.
    ///
    /// # Errors
    /// - `ProviderNotConfigured` when credentials are missing
    /// - `ProviderRejected` when the provider declines or omits a checkout URL
    /// - `ProviderUnavailable` / `ProviderTimeout` for transport failures
    async fn initiate(&self, request: &PaymentRequest) -> AppResult<InitiatedPayment>;

    /// Ask the provider for the current settlement of a payment.
    async fn verify(&self, provider_ref: &ProviderRef) -> AppResult<SettlementStatus>;

    /// Authenticate and decode a webhook. Fails with `InvalidSignature` when the
    /// signature does not verify and `InvalidInput` when the payload is malformed.
    fn decode_webhook(&self, payload: &WebhookPayload) -> AppResult<DecodedWebhook>;
}
