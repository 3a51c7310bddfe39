use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{
    app_error::{AppError, AppResult},
    infra::{
        crypto,
        http_client::{classify_status, map_transport_error},
    },
};

/// Allowed clock skew between the `t=` timestamp and now.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl StripeClient {
    pub fn new(client: Client, secret_key: SecretString, api_base: &str) -> Self {
        Self {
            client,
            secret_key,
            api_base: format!("{}/v1", api_base.trim_end_matches('/')),
        }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Checkout Sessions
    // ========================================================================

    /// One-off payment session. `idempotency_key` makes a retried create
    /// return the session opened by the first attempt.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
        idempotency_key: &str,
    ) -> AppResult<StripeCheckoutSession> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                params.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                params.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                params.product_name.to_string(),
            ),
            ("success_url", params.success_url.to_string()),
            ("cancel_url", params.cancel_url.to_string()),
            ("client_reference_id", params.client_reference_id.to_string()),
            (
                "metadata[transaction_id]",
                params.client_reference_id.to_string(),
            ),
        ];
        if let Some(email) = params.customer_email {
            form.push(("customer_email", email.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .header("Authorization", self.auth_header())
            .header("Idempotency-Key", idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| map_transport_error("Stripe", e))?;

        self.handle_response(response).await
    }

    pub async fn get_checkout_session(&self, session_id: &str) -> AppResult<StripeCheckoutSession> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.api_base, session_id))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| map_transport_error("Stripe", e))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Webhook Signature Verification
    // ========================================================================

    /// Verify a `Stripe-Signature` header (`t=...,v1=...`) against the raw body.
    pub fn verify_webhook_signature(
        payload: &str,
        signature_header: &str,
        webhook_secret: &SecretString,
        now_ts: i64,
    ) -> AppResult<()> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = Some(value),
                "v1" => signatures.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| AppError::InvalidSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(AppError::InvalidSignature("missing v1 signature".into()));
        }

        let signed_payload = format!("{}.{}", timestamp, payload);
        let expected = crypto::hmac_sha256_hex(
            webhook_secret.expose_secret().as_bytes(),
            signed_payload.as_bytes(),
        )?;

        if !signatures
            .iter()
            .any(|sig| crypto::constant_time_compare(sig, &expected))
        {
            return Err(AppError::InvalidSignature("signature mismatch".into()));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::InvalidSignature("invalid timestamp".into()))?;
        if (now_ts - ts).abs() > WEBHOOK_TOLERANCE_SECS {
            return Err(AppError::InvalidSignature(
                "timestamp outside tolerance".into(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error("Stripe", e))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");
            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .ok()
                .map(|e| e.error.message.unwrap_or(e.error.error_type))
                .unwrap_or_else(|| status.to_string());
            return Err(classify_status("Stripe", status, message));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::ProviderUnavailable(format!("unparseable Stripe response: {}", e))
        })
    }
}

pub struct CheckoutSessionParams<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub product_name: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub client_reference_id: &'a str,
    pub customer_email: Option<&'a str>,
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    /// `open`, `complete` or `expired`
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    pub payment_status: Option<String>,
    pub client_reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
}

// ============================================================================
// Webhook Event Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeWebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEventData {
    pub object: serde_json::Value,
}

impl StripeWebhookEvent {
    pub fn checkout_session(&self) -> Option<StripeCheckoutSession> {
        serde_json::from_value(self.data.object.clone()).ok()
    }
}
