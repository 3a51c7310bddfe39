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
    infra::stripe_client::{
        CheckoutSessionParams, StripeCheckoutSession, StripeClient, StripeWebhookEvent,
    },
};

/// Card payments through Stripe Checkout Sessions in `payment` mode.
///
/// The session id is the provider reference.
#[derive(Clone)]
pub struct StripePaymentAdapter {
    client: StripeClient,
    webhook_secret: SecretString,
}

impl StripePaymentAdapter {
    pub fn new(client: StripeClient, webhook_secret: SecretString) -> Self {
        Self {
            client,
            webhook_secret,
        }
    }

    /// Settlement implied by a Checkout Session's `status` / `payment_status`.
    fn session_settlement(session: &StripeCheckoutSession) -> SettlementStatus {
        match (session.status.as_deref(), session.payment_status.as_deref()) {
            (Some("complete"), Some("paid" | "no_payment_required")) => SettlementStatus::Success,
            (Some("expired"), _) => SettlementStatus::Failed,
            _ => SettlementStatus::Pending,
        }
    }

    fn event_settlement(event: &StripeWebhookEvent, session: &StripeCheckoutSession) -> SettlementStatus {
        match event.event_type.as_str() {
            "checkout.session.completed" => Self::session_settlement(session),
            "checkout.session.async_payment_succeeded" => SettlementStatus::Success,
            "checkout.session.async_payment_failed" | "checkout.session.expired" => {
                SettlementStatus::Failed
            }
            _ => SettlementStatus::Pending,
        }
    }

    fn decode_at(&self, payload: &WebhookPayload, now_ts: i64) -> AppResult<DecodedWebhook> {
        let signature = payload
            .signature
            .as_deref()
            .ok_or_else(|| AppError::InvalidSignature("missing Stripe-Signature header".into()))?;
        StripeClient::verify_webhook_signature(&payload.raw, signature, &self.webhook_secret, now_ts)?;

        let event: StripeWebhookEvent = serde_json::from_str(&payload.raw)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
        let session = event.checkout_session().ok_or_else(|| {
            AppError::InvalidInput(format!("{} carries no checkout session", event.event_type))
        })?;

        Ok(DecodedWebhook {
            provider_ref: ProviderRef::new(session.id.clone()),
            status: Self::event_settlement(&event, &session),
            raw_event_type: event.event_type,
        })
    }
}

#[async_trait]
impl PaymentProviderPort for StripePaymentAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn initiate(&self, request: &PaymentRequest) -> AppResult<InitiatedPayment> {
        let transaction_id = request.transaction_id.to_string();
        let session = self
            .client
            .create_checkout_session(
                &CheckoutSessionParams {
                    amount_cents: request.amount_cents,
                    currency: &request.currency,
                    product_name: &request.plan_name,
                    success_url: &request.success_url,
                    cancel_url: &request.cancel_url,
                    client_reference_id: &transaction_id,
                    customer_email: request.customer_email.as_deref(),
                },
                &transaction_id,
            )
            .await?;

        InitiatedPayment::from_response(session.id, session.url)
    }

    async fn verify(&self, provider_ref: &ProviderRef) -> AppResult<SettlementStatus> {
        let session = self.client.get_checkout_session(provider_ref.as_str()).await?;
        Ok(Self::session_settlement(&session))
    }

    fn decode_webhook(&self, payload: &WebhookPayload) -> AppResult<DecodedWebhook> {
        self.decode_at(payload, chrono::Utc::now().timestamp())
    }
}
