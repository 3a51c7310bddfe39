use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{
    app_error::{AppError, AppResult},
    infra::http_client::{classify_status, map_transport_error},
};

/// Payment options offered on the hosted page.
pub const PAYMENT_OPTIONS: &str = "card,mobilemoneyghana,mobilemoneyuganda,mobilemoneyrwanda,mobilemoneyzambia,mpesa";

#[derive(Clone)]
pub struct FlutterwaveClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl FlutterwaveClient {
    pub fn new(client: Client, secret_key: SecretString, api_base: &str) -> Self {
        Self {
            client,
            secret_key,
            api_base: format!("{}/v3", api_base.trim_end_matches('/')),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key.expose_secret())
    }

    // ========================================================================
    // Hosted payments
    // ========================================================================

    /// Create a hosted payment link. `tx_ref` is merchant-generated and is
    /// the reference every later call and webhook refers back to.
    pub async fn create_payment(
        &self,
        params: &HostedPaymentParams<'_>,
    ) -> AppResult<FlutterwaveEnvelope<HostedPaymentLink>> {
        let body = CreatePaymentBody {
            tx_ref: params.tx_ref,
            amount: minor_to_major(params.amount_cents),
            currency: params.currency.to_uppercase(),
            redirect_url: params.redirect_url,
            payment_options: PAYMENT_OPTIONS,
            customer: Customer {
                email: params.customer_email,
            },
            customizations: Customizations {
                title: params.title,
            },
        };

        let response = self
            .client
            .post(format!("{}/payments", self.api_base))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error("Flutterwave", e))?;

        self.handle_response(response).await
    }

    pub async fn verify_by_reference(
        &self,
        tx_ref: &str,
    ) -> AppResult<FlutterwaveEnvelope<FlutterwaveTransaction>> {
        let response = self
            .client
            .get(format!("{}/transactions/verify_by_reference", self.api_base))
            .header("Authorization", self.auth_header())
            .query(&[("tx_ref", tx_ref)])
            .send()
            .await
            .map_err(|e| map_transport_error("Flutterwave", e))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<FlutterwaveEnvelope<T>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error("Flutterwave", e))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Flutterwave API error");
            let message = serde_json::from_str::<FlutterwaveError>(&body)
                .ok()
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            return Err(classify_status("Flutterwave", status, message));
        }

        let envelope: FlutterwaveEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Flutterwave response");
            AppError::ProviderUnavailable(format!("unparseable Flutterwave response: {}", e))
        })?;

        if envelope.status != "success" {
            return Err(AppError::ProviderRejected(envelope.message));
        }
        Ok(envelope)
    }
}

/// Flutterwave takes amounts in major units.
fn minor_to_major(amount_cents: i64) -> f64 {
    amount_cents as f64 / 100.0
}

pub struct HostedPaymentParams<'a> {
    pub tx_ref: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub redirect_url: &'a str,
    pub customer_email: &'a str,
    pub title: &'a str,
}

#[derive(Serialize)]
struct CreatePaymentBody<'a> {
    tx_ref: &'a str,
    amount: f64,
    currency: String,
    redirect_url: &'a str,
    payment_options: &'a str,
    customer: Customer<'a>,
    customizations: Customizations<'a>,
}

#[derive(Serialize)]
struct Customer<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Customizations<'a> {
    title: &'a str,
}

// ============================================================================
// Flutterwave Types
// ============================================================================

/// Every v3 response is wrapped as `{status, message, data}`.
#[derive(Debug, Deserialize)]
pub struct FlutterwaveEnvelope<T> {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct HostedPaymentLink {
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveTransaction {
    pub tx_ref: Option<String>,
    /// `successful`, `failed`, `cancelled` or `pending`
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct FlutterwaveError {
    message: String,
}

/// Webhook body, e.g. `{"event": "charge.completed", "data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct FlutterwaveWebhookEvent {
    pub event: String,
    pub data: FlutterwaveWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveWebhookData {
    pub tx_ref: String,
    pub status: String,
}
