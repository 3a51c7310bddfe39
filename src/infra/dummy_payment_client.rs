use async_trait::async_trait;
use billing_types::SettlementStatus;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        DecodedWebhook, InitiatedPayment, PaymentProviderPort, PaymentRequest, ProviderRef,
        WebhookPayload,
    },
    domain::entities::{payment_provider::PaymentProvider, payment_scenario::PaymentScenario},
};

/// Value the `x-dummy-signature` header must carry when present.
pub const DUMMY_WEBHOOK_SIGNATURE: &str = "dummy";

const REF_PREFIX: &str = "dummy_";

/// Dummy payment client for local development and tests.
///
/// Simulates a hosted checkout without any network traffic. The scenario is
/// encoded in the provider reference (`dummy_{scenario}_{uuid}`), so `verify`
/// needs no stored state.
#[derive(Clone, Default)]
pub struct DummyPaymentClient;

impl DummyPaymentClient {
    pub fn new() -> Self {
        Self
    }

    fn generate_ref(scenario: PaymentScenario) -> ProviderRef {
        ProviderRef::new(format!("{}{}_{}", REF_PREFIX, scenario, Uuid::new_v4()))
    }

    /// Recover the scenario a reference was issued for.
    fn scenario_from_ref(provider_ref: &ProviderRef) -> AppResult<PaymentScenario> {
        provider_ref
            .as_str()
            .strip_prefix(REF_PREFIX)
            .and_then(|rest| rest.rsplit_once('_'))
            .filter(|(_, id)| Uuid::parse_str(id).is_ok())
            .and_then(|(scenario, _)| scenario.parse().ok())
            .ok_or(AppError::NotFound)
    }

    fn checkout_url(success_url: &str, provider_ref: &ProviderRef) -> AppResult<String> {
        let mut url = Url::parse(success_url)
            .map_err(|_| AppError::InvalidInput("success_url must be an absolute URL".into()))?;
        url.query_pairs_mut()
            .append_pair("dummy_ref", provider_ref.as_str());
        Ok(url.into())
    }
}

#[derive(Debug, Deserialize)]
struct DummyWebhookBody {
    provider_ref: String,
    status: SettlementStatus,
    #[serde(default)]
    event_type: Option<String>,
}

#[async_trait]
impl PaymentProviderPort for DummyPaymentClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Dummy
    }

    async fn initiate(&self, request: &PaymentRequest) -> AppResult<InitiatedPayment> {
        let scenario = request.scenario.unwrap_or_default();
        tracing::debug!(
            transaction_id = %request.transaction_id,
            scenario = %scenario,
            "Dummy: Opening checkout"
        );

        match scenario {
            PaymentScenario::Rejected => Err(AppError::ProviderRejected(
                "Dummy provider rejected the payment request".into(),
            )),
            PaymentScenario::Unavailable => Err(AppError::ProviderUnavailable(
                "Dummy provider is unreachable".into(),
            )),
            _ => {
                let provider_ref = Self::generate_ref(scenario);
                let url = Self::checkout_url(&request.success_url, &provider_ref)?;
                InitiatedPayment::from_response(provider_ref.0, Some(url))
            }
        }
    }

    async fn verify(&self, provider_ref: &ProviderRef) -> AppResult<SettlementStatus> {
        let scenario = Self::scenario_from_ref(provider_ref)?;
        Ok(scenario.settlement())
    }

    fn decode_webhook(&self, payload: &WebhookPayload) -> AppResult<DecodedWebhook> {
        if matches!(payload.signature.as_deref(), Some(sig) if sig != DUMMY_WEBHOOK_SIGNATURE) {
            return Err(AppError::InvalidSignature(
                "unexpected x-dummy-signature".into(),
            ));
        }

        let body: DummyWebhookBody = serde_json::from_str(&payload.raw)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

        let raw_event_type = body
            .event_type
            .unwrap_or_else(|| format!("dummy.payment.{}", body.status.as_ref()));

        Ok(DecodedWebhook {
            provider_ref: ProviderRef::new(body.provider_ref),
            status: body.status,
            raw_event_type,
        })
    }
}
