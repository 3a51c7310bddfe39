//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use billing_types::{CategoryLimits, Limit};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
    application::use_cases::{
        ledger::PaymentTransactionProfile, plans::SubscriptionPlanProfile,
        subscriptions::UserSubscriptionProfile,
    },
    domain::entities::{
        billing_cycle::BillingCycle, payment_provider::PaymentProvider,
        transaction_status::TransactionStatus, user_subscription::SubscriptionStatus,
    },
};

/// Create a test plan: monthly, 25.00 USD, 5 car posts and unlimited car views.
pub fn create_test_plan(
    overrides: impl FnOnce(&mut SubscriptionPlanProfile),
) -> SubscriptionPlanProfile {
    let mut plan = SubscriptionPlanProfile {
        id: Uuid::new_v4(),
        category: "vehicles".to_string(),
        tier: "gold".to_string(),
        name: "Gold Monthly".to_string(),
        price_cents: 2500,
        currency: "usd".to_string(),
        billing_cycle: BillingCycle::Monthly,
        post_limits: CategoryLimits::from([("cars".to_string(), Limit::Bounded(5))]),
        view_limits: CategoryLimits::from([("cars".to_string(), Limit::Unlimited)]),
        is_active: true,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut plan);
    plan
}

/// Create an active subscription that started a day before `test_datetime()`.
pub fn create_test_subscription(
    subscriber_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut UserSubscriptionProfile),
) -> UserSubscriptionProfile {
    let mut sub = UserSubscriptionProfile {
        id: Uuid::new_v4(),
        subscriber_id,
        plan_id,
        status: SubscriptionStatus::Active,
        start_date: Some(test_datetime() - Duration::days(1)),
        end_date: Some(test_datetime() + Duration::days(30)),
        amount_paid_cents: 2500,
        currency: "usd".to_string(),
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut sub);
    sub
}

/// Create a pending dummy-provider transaction.
pub fn create_test_transaction(
    overrides: impl FnOnce(&mut PaymentTransactionProfile),
) -> PaymentTransactionProfile {
    let mut tx = PaymentTransactionProfile {
        id: Uuid::new_v4(),
        provider: PaymentProvider::Dummy,
        provider_ref: None,
        subscriber_id: Uuid::new_v4(),
        subscription_id: None,
        plan_id: Uuid::new_v4(),
        amount_cents: 2500,
        currency: "usd".to_string(),
        status: TransactionStatus::Pending,
        metadata: serde_json::json!({}),
        created_at: Some(test_datetime()),
        paid_at: None,
        updated_at: Some(test_datetime()),
    };
    overrides(&mut tx);
    tx
}

/// Fixed datetime for reproducible tests.
pub fn test_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}
