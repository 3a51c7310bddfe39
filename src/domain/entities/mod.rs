pub mod billing_cycle;
pub mod payment_provider;
pub mod payment_scenario;
pub mod transaction_status;
pub mod user_subscription;
pub mod webhook_outcome;
