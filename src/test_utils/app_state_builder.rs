//! Test app state builder for HTTP-level integration testing.
//!
//! `TestAppStateBuilder` wires every use case to one shared
//! `InMemoryBillingStore` and a scripted Stripe adapter, plus the stateless
//! dummy provider.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        activator::SubscriptionActivator,
        checkout::{CheckoutUseCases, ProviderCallPolicy},
        ledger::{LedgerUseCases, PaymentTransactionProfile},
        payment_provider_registry::PaymentProviderRegistry,
        plans::{PlanUseCases, SubscriptionPlanProfile},
        reconciler::ReconcilerUseCases,
        subscriptions::{SubscriptionUseCases, UserSubscriptionProfile},
        usage_meter::UsageMeterUseCases,
    },
    domain::entities::payment_provider::PaymentProvider,
    infra::{
        config::{AppConfig, LogFormat},
        dummy_payment_client::DummyPaymentClient,
        plan_cache::TtlPlanCache,
    },
    test_utils::{InMemoryBillingStore, ScriptedPaymentProvider},
};

/// Bearer token the built state accepts on `/api/admin`.
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let plan = create_test_plan(|_| {});
/// let (app_state, store, provider) = TestAppStateBuilder::new()
///     .with_plan(plan)
///     .build_with_mocks();
/// ```
pub struct TestAppStateBuilder {
    plans: Vec<SubscriptionPlanProfile>,
    subscriptions: Vec<UserSubscriptionProfile>,
    transactions: Vec<PaymentTransactionProfile>,
    admin_token: Option<String>,
    dummy_enabled: bool,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            plans: vec![],
            subscriptions: vec![],
            transactions: vec![],
            admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
            dummy_enabled: true,
        }
    }

    pub fn with_plan(mut self, plan: SubscriptionPlanProfile) -> Self {
        self.plans.push(plan);
        self
    }

    pub fn with_subscription(mut self, sub: UserSubscriptionProfile) -> Self {
        self.subscriptions.push(sub);
        self
    }

    pub fn with_transaction(mut self, tx: PaymentTransactionProfile) -> Self {
        self.transactions.push(tx);
        self
    }

    /// Leave `ADMIN_API_TOKEN` unset.
    pub fn without_admin_token(mut self) -> Self {
        self.admin_token = None;
        self
    }

    pub fn without_dummy_provider(mut self) -> Self {
        self.dummy_enabled = false;
        self
    }

    pub fn build(self) -> AppState {
        self.build_with_mocks().0
    }

    /// Build the state and hand back the store and the scripted Stripe adapter
    /// for assertions.
    pub fn build_with_mocks(
        self,
    ) -> (
        AppState,
        Arc<InMemoryBillingStore>,
        Arc<ScriptedPaymentProvider>,
    ) {
        let store = Arc::new(InMemoryBillingStore::new());
        for plan in self.plans {
            store.insert_plan(plan);
        }
        for sub in self.subscriptions {
            store.insert_subscription(sub);
        }
        for tx in self.transactions {
            store.insert_transaction(tx);
        }

        let stripe = Arc::new(ScriptedPaymentProvider::new(PaymentProvider::Stripe));
        let mut registry = PaymentProviderRegistry::new().with_adapter(stripe.clone());
        if self.dummy_enabled {
            registry = registry.with_adapter(Arc::new(DummyPaymentClient::new()));
        }
        let registry = Arc::new(registry);

        let config = Arc::new(AppConfig {
            database_url: String::new(),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            run_migrations: false,
            log_format: LogFormat::Pretty,
            stripe: None,
            flutterwave: None,
            dummy_provider_enabled: self.dummy_enabled,
            provider_timeout: Duration::from_millis(200),
            provider_max_attempts: 2,
            provider_retry_backoff: Duration::from_millis(1),
            plan_cache_ttl: Duration::from_secs(60),
            admin_api_token: self
                .admin_token
                .map(|token| SecretString::new(token.into())),
        });

        let plan_use_cases = Arc::new(PlanUseCases::new(
            store.clone(),
            Arc::new(TtlPlanCache::new(config.plan_cache_ttl)),
        ));
        let subscription_use_cases = Arc::new(SubscriptionUseCases::new(store.clone()));
        let ledger_use_cases = Arc::new(LedgerUseCases::new(store.clone()));
        let checkout_use_cases = Arc::new(CheckoutUseCases::new(
            plan_use_cases.clone(),
            store.clone(),
            ledger_use_cases.clone(),
            registry.clone(),
            ProviderCallPolicy {
                timeout: config.provider_timeout,
                max_attempts: config.provider_max_attempts,
                backoff: config.provider_retry_backoff,
            },
        ));
        let activator = Arc::new(SubscriptionActivator::new(
            plan_use_cases.clone(),
            store.clone(),
        ));
        let reconciler_use_cases = Arc::new(ReconcilerUseCases::new(
            store.clone(),
            ledger_use_cases.clone(),
            activator,
            registry,
            config.provider_timeout,
        ));
        let usage_meter_use_cases = Arc::new(UsageMeterUseCases::new(
            plan_use_cases.clone(),
            store.clone(),
            store.clone(),
        ));

        let app_state = AppState {
            config,
            plan_use_cases,
            subscription_use_cases,
            ledger_use_cases,
            checkout_use_cases,
            reconciler_use_cases,
            usage_meter_use_cases,
        };
        (app_state, store, stripe)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
