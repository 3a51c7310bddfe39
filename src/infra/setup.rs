use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        activator::SubscriptionActivator,
        checkout::{CheckoutUseCases, ProviderCallPolicy},
        ledger::LedgerUseCases,
        payment_provider_registry::PaymentProviderRegistry,
        plans::PlanUseCases,
        reconciler::ReconcilerUseCases,
        subscriptions::SubscriptionUseCases,
        usage_meter::UsageMeterUseCases,
    },
    infra::{
        config::{AppConfig, LogFormat},
        db::run_migrations,
        dummy_payment_client::DummyPaymentClient,
        error::InfraError,
        flutterwave_client::FlutterwaveClient,
        flutterwave_payment_adapter::FlutterwavePaymentAdapter,
        http_client::build_client_with_timeout,
        plan_cache::TtlPlanCache,
        postgres_persistence,
        stripe_client::StripeClient,
        stripe_payment_adapter::StripePaymentAdapter,
    },
};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    if config.run_migrations {
        run_migrations(postgres_arc.pool()).await?;
    }

    let registry = Arc::new(build_provider_registry(&config)?);

    let plan_use_cases = Arc::new(PlanUseCases::new(
        postgres_arc.clone(),
        Arc::new(TtlPlanCache::new(config.plan_cache_ttl)),
    ));
    let subscription_use_cases = Arc::new(SubscriptionUseCases::new(postgres_arc.clone()));
    let ledger_use_cases = Arc::new(LedgerUseCases::new(postgres_arc.clone()));

    let checkout_use_cases = Arc::new(CheckoutUseCases::new(
        plan_use_cases.clone(),
        postgres_arc.clone(),
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
        postgres_arc.clone(),
    ));
    let reconciler_use_cases = Arc::new(ReconcilerUseCases::new(
        postgres_arc.clone(),
        ledger_use_cases.clone(),
        activator,
        registry,
        config.provider_timeout,
    ));

    let usage_meter_use_cases = Arc::new(UsageMeterUseCases::new(
        plan_use_cases.clone(),
        postgres_arc.clone(),
        postgres_arc,
    ));

    Ok(AppState {
        config: Arc::new(config),
        plan_use_cases,
        subscription_use_cases,
        ledger_use_cases,
        checkout_use_cases,
        reconciler_use_cases,
        usage_meter_use_cases,
    })
}

/// One adapter per provider with credentials. Providers left out answer
/// `ProviderNotConfigured`.
fn build_provider_registry(config: &AppConfig) -> Result<PaymentProviderRegistry, InfraError> {
    let http = build_client_with_timeout(config.provider_timeout).map_err(InfraError::HttpClient)?;
    let mut registry = PaymentProviderRegistry::new();

    if let Some(stripe) = &config.stripe {
        let client = StripeClient::new(http.clone(), stripe.secret_key.clone(), &stripe.api_base);
        registry = registry.with_adapter(Arc::new(StripePaymentAdapter::new(
            client,
            stripe.webhook_secret.clone(),
        )));
    }

    if let Some(flutterwave) = &config.flutterwave {
        let client = FlutterwaveClient::new(
            http.clone(),
            flutterwave.secret_key.clone(),
            &flutterwave.api_base,
        );
        registry = registry.with_adapter(Arc::new(FlutterwavePaymentAdapter::new(
            client,
            flutterwave.webhook_hash.clone(),
        )));
    }

    if config.dummy_provider_enabled {
        tracing::warn!("Dummy payment provider enabled; payments are simulated");
        registry = registry.with_adapter(Arc::new(DummyPaymentClient::new()));
    }

    let enabled = registry.enabled();
    if enabled.is_empty() {
        tracing::warn!("No payment provider configured; checkout will be unavailable");
    } else {
        tracing::info!(providers = ?enabled, "Payment providers enabled");
    }
    Ok(registry)
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketplace_billing=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(false) // don't show target (module path)
                    .with_level(true)
                    .pretty(),
            )
            .try_init()
            .ok(),
        // Structured logs for collectors
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .ok(),
    };
}
