use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        checkout::CheckoutUseCases, ledger::LedgerUseCases, plans::PlanUseCases,
        reconciler::ReconcilerUseCases, subscriptions::SubscriptionUseCases,
        usage_meter::UsageMeterUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub plan_use_cases: Arc<PlanUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub ledger_use_cases: Arc<LedgerUseCases>,
    pub checkout_use_cases: Arc<CheckoutUseCases>,
    pub reconciler_use_cases: Arc<ReconcilerUseCases>,
    pub usage_meter_use_cases: Arc<UsageMeterUseCases>,
}
