use std::sync::Arc;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

use super::{
    ledger::{Activation, PaymentTransactionProfile},
    plans::PlanUseCases,
    subscriptions::UserSubscriptionRepoTrait,
};

/// Computes the entitlement a settled transaction grants.
///
/// The result is handed to `LedgerUseCases::mark_completed`, which persists it
/// in the same database transaction as the ledger update.
#[derive(Clone)]
pub struct SubscriptionActivator {
    plans: Arc<PlanUseCases>,
    subscriptions: Arc<dyn UserSubscriptionRepoTrait>,
}

impl SubscriptionActivator {
    pub fn new(plans: Arc<PlanUseCases>, subscriptions: Arc<dyn UserSubscriptionRepoTrait>) -> Self {
        Self {
            plans,
            subscriptions,
        }
    }

    /// Entitlement `tx` grants when settled at `now`.
    ///
    /// Resolves the live plan and the subscription row to activate or extend.
    /// The validity window itself is computed by storage from the locked row.
    pub async fn prepare(
        &self,
        tx: &PaymentTransactionProfile,
        now: NaiveDateTime,
    ) -> AppResult<Activation> {
        let plan = self.plans.get_plan(tx.plan_id).await?;

        let existing = match tx.subscription_id {
            Some(id) => self.subscriptions.get_by_id(id).await?,
            None => None,
        };

        if let Some(sub) = &existing
            && sub.subscriber_id != tx.subscriber_id
        {
            return Err(AppError::Internal(format!(
                "subscription {} does not belong to subscriber {}",
                sub.id, tx.subscriber_id
            )));
        }

        let activation = Activation {
            subscription_id: existing.as_ref().map(|s| s.id).unwrap_or_else(Uuid::new_v4),
            subscriber_id: tx.subscriber_id,
            plan_id: plan.id,
            billing_cycle: plan.billing_cycle,
            amount_paid_cents: tx.amount_cents,
            currency: tx.currency.clone(),
            paid_at: now,
        };

        // Fail before touching the ledger when the window cannot be computed
        let window = activation.window(existing.as_ref())?;
        tracing::debug!(
            transaction_id = %tx.id,
            plan_id = %plan.id,
            billing_cycle = %plan.billing_cycle,
            start_date = %window.start_date,
            end_date = ?window.end_date,
            "Prepared activation"
        );

        Ok(activation)
    }
}
