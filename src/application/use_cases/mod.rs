pub mod activator;
pub mod checkout;
pub mod ledger;
pub mod payment_provider_registry;
pub mod plans;
pub mod reconciler;
pub mod subscriptions;
pub mod usage_meter;
