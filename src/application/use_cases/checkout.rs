use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{InitiatedPayment, PaymentProviderPort, PaymentRequest},
    domain::entities::{
        payment_provider::PaymentProvider, payment_scenario::PaymentScenario,
        user_subscription::SubscriptionStatus,
    },
};

use super::{
    ledger::{LedgerUseCases, NewTransaction},
    payment_provider_registry::PaymentProviderRegistry,
    plans::PlanUseCases,
    subscriptions::UserSubscriptionRepoTrait,
};

/// Timeout and retry envelope for outbound provider calls.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one
    pub backoff: Duration,
}

impl Default for ProviderCallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl ProviderCallPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        // attempt is 1-based; no delay before the first
        let exp = attempt.saturating_sub(2).min(16);
        self.backoff.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub subscriber_id: Uuid,
    pub plan_id: Uuid,
    pub provider: PaymentProvider,
    /// Base URL the provider redirects back to; `/success` and `/cancel` are appended
    pub return_url_prefix: String,
    pub customer_email: Option<String>,
    pub scenario: Option<PaymentScenario>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub transaction_id: Uuid,
    pub subscription_id: Uuid,
    pub provider_ref: String,
    pub checkout_url: String,
}

#[derive(Clone)]
pub struct CheckoutUseCases {
    plans: Arc<PlanUseCases>,
    subscriptions: Arc<dyn UserSubscriptionRepoTrait>,
    ledger: Arc<LedgerUseCases>,
    providers: Arc<PaymentProviderRegistry>,
    policy: ProviderCallPolicy,
}

impl CheckoutUseCases {
    pub fn new(
        plans: Arc<PlanUseCases>,
        subscriptions: Arc<dyn UserSubscriptionRepoTrait>,
        ledger: Arc<LedgerUseCases>,
        providers: Arc<PaymentProviderRegistry>,
        policy: ProviderCallPolicy,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            ledger,
            providers,
            policy,
        }
    }

    /// Create the pending ledger entry and open a hosted payment page.
    ///
    /// Any non-retryable initiation error, a provider rejection included,
    /// marks the transaction failed. Timeouts and unavailability that outlast
    /// the retry budget leave it pending so that a later webhook or verify call
    /// can still settle it.
    pub async fn begin_checkout(
        &self,
        request: CheckoutRequest,
        now: NaiveDateTime,
    ) -> AppResult<CheckoutSession> {
        let return_base = parse_return_url(&request.return_url_prefix)?;

        let plan = self.plans.get_plan(request.plan_id).await?;
        if !plan.is_active {
            return Err(AppError::InvalidInput("Plan is not available".into()));
        }
        if plan.price_cents <= 0 {
            return Err(AppError::InvalidInput(
                "Free plans do not require checkout".into(),
            ));
        }

        let adapter = self.providers.get(request.provider)?;
        if request.provider.requires_customer_email()
            && request
                .customer_email
                .as_deref()
                .is_none_or(|email| email.trim().is_empty())
        {
            return Err(AppError::InvalidInput(format!(
                "customer_email is required for {}",
                request.provider.display_name()
            )));
        }

        let subscription = match self
            .subscriptions
            .find_reusable(request.subscriber_id, plan.id, now)
            .await?
        {
            Some(sub) => sub,
            None => {
                self.subscriptions
                    .create_pending(request.subscriber_id, plan.id, &plan.currency)
                    .await?
            }
        };

        let tx = self
            .ledger
            .create_pending(NewTransaction {
                provider: request.provider,
                subscriber_id: request.subscriber_id,
                subscription_id: Some(subscription.id),
                plan_id: plan.id,
                amount_cents: plan.price_cents,
                currency: plan.currency.clone(),
                metadata: serde_json::json!({
                    "plan_name": plan.name,
                    "plan_tier": plan.tier,
                    "billing_cycle": plan.billing_cycle,
                    "renewal": subscription.status == SubscriptionStatus::Active,
                }),
            })
            .await?;

        let payment = PaymentRequest {
            transaction_id: tx.id,
            subscriber_id: request.subscriber_id,
            plan_id: plan.id,
            plan_name: plan.name.clone(),
            amount_cents: tx.amount_cents,
            currency: tx.currency.clone(),
            success_url: format!("{}/success?transaction_id={}", return_base, tx.id),
            cancel_url: format!("{}/cancel?transaction_id={}", return_base, tx.id),
            customer_email: request.customer_email.clone(),
            scenario: request.scenario,
        };

        let initiated = match self.initiate_with_retry(adapter.as_ref(), &payment).await {
            Ok(initiated) => initiated,
            Err(e) if e.is_retryable_provider_error() => {
                tracing::warn!(
                    transaction_id = %tx.id,
                    provider = %request.provider,
                    error = %e,
                    "Payment initiation did not complete, transaction left pending"
                );
                return Err(e);
            }
            // Without a provider reference nothing can ever settle this row
            Err(e) => {
                tracing::warn!(
                    transaction_id = %tx.id,
                    provider = %request.provider,
                    error = %e,
                    "Payment initiation failed"
                );
                self.ledger.mark_failed(tx.id).await?;
                return Err(e);
            }
        };

        self.ledger
            .attach_provider_ref(tx.id, initiated.provider_ref.as_str())
            .await?;

        tracing::info!(
            transaction_id = %tx.id,
            provider = %request.provider,
            provider_ref = %initiated.provider_ref,
            "Checkout initiated"
        );

        Ok(CheckoutSession {
            transaction_id: tx.id,
            subscription_id: subscription.id,
            provider_ref: initiated.provider_ref.0,
            checkout_url: initiated.checkout_url,
        })
    }

    async fn initiate_with_retry(
        &self,
        adapter: &dyn PaymentProviderPort,
        payment: &PaymentRequest,
    ) -> AppResult<InitiatedPayment> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = AppError::ProviderTimeout;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.delay_before(attempt)).await;
            }

            let result = tokio::time::timeout(self.policy.timeout, adapter.initiate(payment))
                .await
                .unwrap_or(Err(AppError::ProviderTimeout));

            match result {
                Ok(initiated) => return Ok(initiated),
                Err(e) if e.is_retryable_provider_error() => {
                    tracing::debug!(
                        transaction_id = %payment.transaction_id,
                        attempt,
                        error = %e,
                        "Retryable provider error"
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }
}

fn parse_return_url(raw: &str) -> AppResult<String> {
    let url = Url::parse(raw.trim())
        .map_err(|_| AppError::InvalidInput("return_url_prefix must be an absolute URL".into()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidInput(
            "return_url_prefix must use http or https".into(),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(AppError::InvalidInput(
            "return_url_prefix must not carry a query or fragment".into(),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}
