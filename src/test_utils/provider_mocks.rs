//! Scripted payment provider for checkout and reconciliation tests.

use async_trait::async_trait;
use billing_types::SettlementStatus;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        DecodedWebhook, InitiatedPayment, PaymentProviderPort, PaymentRequest, ProviderRef,
        WebhookPayload,
    },
    domain::entities::payment_provider::PaymentProvider,
};

/// Signature header value `ScriptedPaymentProvider` accepts.
pub const SCRIPTED_SIGNATURE: &str = "scripted-signature";

#[derive(Deserialize)]
struct ScriptedEvent {
    #[serde(rename = "ref")]
    provider_ref: String,
    status: SettlementStatus,
    #[serde(rename = "type", default = "default_event_type")]
    event_type: String,
}

fn default_event_type() -> String {
    "payment.updated".to_string()
}

/// Provider double whose answers are queued up front.
///
/// `initiate` pops scripted results and falls back to a generated session when
/// the queue is empty. `verify` answers `pending` for unknown references.
pub struct ScriptedPaymentProvider {
    provider: PaymentProvider,
    initiate_results: Mutex<VecDeque<AppResult<InitiatedPayment>>>,
    initiate_delay: Mutex<Option<Duration>>,
    verify_results: Mutex<HashMap<String, AppResult<SettlementStatus>>>,
    requests: Mutex<Vec<PaymentRequest>>,
    initiate_calls: AtomicU32,
    verify_calls: AtomicU32,
}

impl ScriptedPaymentProvider {
    pub fn new(provider: PaymentProvider) -> Self {
        Self {
            provider,
            initiate_results: Mutex::new(VecDeque::new()),
            initiate_delay: Mutex::new(None),
            verify_results: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            initiate_calls: AtomicU32::new(0),
            verify_calls: AtomicU32::new(0),
        }
    }

    pub fn push_initiate_result(&self, result: AppResult<InitiatedPayment>) {
        self.initiate_results.lock().unwrap().push_back(result);
    }

    pub fn set_initiate_delay(&self, delay: Duration) {
        *self.initiate_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_verify_result(&self, provider_ref: &str, result: AppResult<SettlementStatus>) {
        self.verify_results
            .lock()
            .unwrap()
            .insert(provider_ref.to_string(), result);
    }

    pub fn initiate_calls(&self) -> u32 {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PaymentRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Webhook body in the format `decode_webhook` understands.
    pub fn webhook_body(provider_ref: &str, status: &str) -> String {
        serde_json::json!({
            "ref": provider_ref,
            "status": status,
            "type": format!("payment.{}", status),
        })
        .to_string()
    }
}

#[async_trait]
impl PaymentProviderPort for ScriptedPaymentProvider {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    async fn initiate(&self, request: &PaymentRequest) -> AppResult<InitiatedPayment> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.initiate_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.initiate_results.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => InitiatedPayment::from_response(
                format!("scripted_{}", request.transaction_id),
                Some(format!(
                    "https://pay.example/checkout/{}",
                    request.transaction_id
                )),
            ),
        }
    }

    async fn verify(&self, provider_ref: &ProviderRef) -> AppResult<SettlementStatus> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match self.verify_results.lock().unwrap().get(provider_ref.as_str()) {
            Some(Ok(status)) => Ok(*status),
            Some(Err(e)) => Err(AppError::ProviderUnavailable(e.to_string())),
            None => Ok(SettlementStatus::Pending),
        }
    }

    fn decode_webhook(&self, payload: &WebhookPayload) -> AppResult<DecodedWebhook> {
        if payload.signature.as_deref() != Some(SCRIPTED_SIGNATURE) {
            return Err(AppError::InvalidSignature("signature mismatch".into()));
        }
        let event: ScriptedEvent = serde_json::from_str(&payload.raw)
            .map_err(|e| AppError::InvalidInput(format!("malformed webhook: {e}")))?;
        Ok(DecodedWebhook {
            provider_ref: ProviderRef::new(event.provider_ref),
            status: event.status,
            raw_event_type: event.event_type,
        })
    }
}
