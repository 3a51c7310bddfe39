use async_trait::async_trait;
use billing_types::SettlementStatus;
use secrecy::SecretString;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        DecodedWebhook, InitiatedPayment, PaymentProviderPort, PaymentRequest, ProviderRef,
        WebhookPayload,
    },
    domain::entities::payment_provider::PaymentProvider,
    infra::{
        crypto,
        flutterwave_client::{FlutterwaveClient, FlutterwaveWebhookEvent, HostedPaymentParams},
    },
};

/// Card and mobile money through Flutterwave hosted payment links.
///
/// The ledger transaction id is sent as `tx_ref` and becomes the provider
/// reference, so a retried initiation can never open a second payment.
#[derive(Clone)]
pub struct FlutterwavePaymentAdapter {
    client: FlutterwaveClient,
    webhook_hash: SecretString,
}

impl FlutterwavePaymentAdapter {
    pub fn new(client: FlutterwaveClient, webhook_hash: SecretString) -> Self {
        Self {
            client,
            webhook_hash,
        }
    }

    fn settlement(status: &str) -> SettlementStatus {
        match status.to_ascii_lowercase().as_str() {
            "successful" | "succeeded" => SettlementStatus::Success,
            "failed" | "cancelled" => SettlementStatus::Failed,
            _ => SettlementStatus::Pending,
        }
    }
}

#[async_trait]
impl PaymentProviderPort for FlutterwavePaymentAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Flutterwave
    }

    async fn initiate(&self, request: &PaymentRequest) -> AppResult<InitiatedPayment> {
        let customer_email = request.customer_email.as_deref().ok_or_else(|| {
            AppError::InvalidInput("customer_email is required for Flutterwave".into())
        })?;
        let tx_ref = request.transaction_id.to_string();

        let envelope = self
            .client
            .create_payment(&HostedPaymentParams {
                tx_ref: &tx_ref,
                amount_cents: request.amount_cents,
                currency: &request.currency,
                redirect_url: &request.success_url,
                customer_email,
                title: &request.plan_name,
            })
            .await?;

        InitiatedPayment::from_response(tx_ref, envelope.data.and_then(|d| d.link))
    }

    async fn verify(&self, provider_ref: &ProviderRef) -> AppResult<SettlementStatus> {
        let envelope = self.client.verify_by_reference(provider_ref.as_str()).await?;
        let transaction = envelope.data.ok_or(AppError::NotFound)?;
        Ok(Self::settlement(&transaction.status))
    }

    fn decode_webhook(&self, payload: &WebhookPayload) -> AppResult<DecodedWebhook> {
        let hash = payload
            .signature
            .as_deref()
            .ok_or_else(|| AppError::InvalidSignature("missing verif-hash header".into()))?;
        if !crypto::matches_secret(hash, &self.webhook_hash) {
            return Err(AppError::InvalidSignature("verif-hash mismatch".into()));
        }

        let event: FlutterwaveWebhookEvent = serde_json::from_str(&payload.raw)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

        Ok(DecodedWebhook {
            provider_ref: ProviderRef::new(event.data.tx_ref),
            status: Self::settlement(&event.data.status),
            raw_event_type: event.event,
        })
    }
}
