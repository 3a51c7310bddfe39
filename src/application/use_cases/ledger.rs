use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        billing_cycle::BillingCycle, payment_provider::PaymentProvider,
        transaction_status::TransactionStatus,
    },
};

use super::subscriptions::UserSubscriptionProfile;

// ============================================================================
// Profiles & Inputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentTransactionProfile {
    pub id: Uuid,
    pub provider: PaymentProvider,
    /// Set once initiation returns
    pub provider_ref: Option<String>,
    pub subscriber_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub metadata: JsonValue,
    pub created_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub provider: PaymentProvider,
    pub subscriber_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub metadata: JsonValue,
}

/// Entitlement written in the same database transaction as `pending -> completed`.
///
/// The validity window is not precomputed: storage derives it through
/// [`Activation::window`] from the subscription row it holds locked, so two
/// renewals settling concurrently each extend the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Existing row to activate or extend; a new row is inserted under this id otherwise
    pub subscription_id: Uuid,
    pub subscriber_id: Uuid,
    pub plan_id: Uuid,
    pub billing_cycle: BillingCycle,
    pub amount_paid_cents: i64,
    pub currency: String,
    pub paid_at: NaiveDateTime,
}

/// Validity window an activation leaves on the subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionWindow {
    /// Anchor of the billing periods
    pub start_date: NaiveDateTime,
    /// `None` for lifetime plans
    pub end_date: Option<NaiveDateTime>,
}

impl Activation {
    /// Window after this payment is applied to `current`.
    ///
    /// A fresh or lapsed subscription starts at `paid_at`. One still active on
    /// the same plan keeps its anchor and gains one period past its current
    /// end, so an early renewal never shortens the paid term.
    pub fn window(&self, current: Option<&UserSubscriptionProfile>) -> AppResult<SubscriptionWindow> {
        let renewal = current
            .filter(|sub| sub.plan_id == self.plan_id && sub.is_active_at(self.paid_at))
            .and_then(|sub| sub.start_date.map(|start| (start, sub.end_date)));

        let window = match renewal {
            // Lifetime entitlement stays lifetime
            Some((start_date, None)) => SubscriptionWindow {
                start_date,
                end_date: None,
            },
            Some((start_date, Some(current_end))) => SubscriptionWindow {
                start_date,
                end_date: self.billing_cycle.next_boundary_after(start_date, current_end),
            },
            None => SubscriptionWindow {
                start_date: self.paid_at,
                end_date: self.billing_cycle.period_end(self.paid_at),
            },
        };

        if !self.billing_cycle.is_lifetime() && window.end_date.is_none() {
            return Err(AppError::Internal(format!(
                "billing period overflow for subscription {}",
                self.subscription_id
            )));
        }
        Ok(window)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub pending_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub refunded_count: i64,
    /// Completed revenue, refunded rows excluded
    pub revenue_cents: i64,
    pub refunded_cents: i64,
}

/// Result of a guarded ledger transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This call moved the row
    Applied,
    /// The row was already in the requested state; nothing written
    AlreadyApplied,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PaymentTransactionRepoTrait: Send + Sync {
    async fn create(&self, input: &NewTransaction) -> AppResult<PaymentTransactionProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentTransactionProfile>>;

    async fn get_by_provider_ref(
        &self,
        provider: PaymentProvider,
        provider_ref: &str,
    ) -> AppResult<Option<PaymentTransactionProfile>>;

    async fn attach_provider_ref(&self, id: Uuid, provider_ref: &str) -> AppResult<()>;

    /// Conditional update `WHERE status = from`. Returns false when no row matched.
    async fn transition_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> AppResult<bool>;

    /// Atomically move `pending -> completed` and upsert the entitlement, with
    /// the window computed from the subscription row as locked inside the same
    /// transaction. Returns `None`, writing nothing, when the row was no longer pending.
    async fn complete_and_activate(
        &self,
        id: Uuid,
        activation: &Activation,
    ) -> AppResult<Option<SubscriptionWindow>>;

    async fn list_by_subscriber(&self, subscriber_id: Uuid)
    -> AppResult<Vec<PaymentTransactionProfile>>;

    async fn summary(&self) -> AppResult<LedgerSummary>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct LedgerUseCases {
    repo: Arc<dyn PaymentTransactionRepoTrait>,
}

impl LedgerUseCases {
    pub fn new(repo: Arc<dyn PaymentTransactionRepoTrait>) -> Self {
        Self { repo }
    }

    /// Always inserts a new pending row.
    pub async fn create_pending(&self, input: NewTransaction) -> AppResult<PaymentTransactionProfile> {
        if input.amount_cents <= 0 {
            return Err(AppError::InvalidInput(
                "Transaction amount must be positive".into(),
            ));
        }
        let tx = self.repo.create(&input).await?;
        tracing::info!(
            transaction_id = %tx.id,
            provider = %tx.provider,
            subscriber_id = %tx.subscriber_id,
            amount_cents = tx.amount_cents,
            currency = %tx.currency,
            "Pending transaction created"
        );
        Ok(tx)
    }

    pub async fn attach_provider_ref(&self, id: Uuid, provider_ref: &str) -> AppResult<()> {
        self.repo.attach_provider_ref(id, provider_ref).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PaymentTransactionProfile> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn find_by_provider_ref(
        &self,
        provider: PaymentProvider,
        provider_ref: &str,
    ) -> AppResult<Option<PaymentTransactionProfile>> {
        self.repo.get_by_provider_ref(provider, provider_ref).await
    }

    pub async fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
    ) -> AppResult<Vec<PaymentTransactionProfile>> {
        self.repo.list_by_subscriber(subscriber_id).await
    }

    /// `pending -> completed` together with the entitlement.
    pub async fn mark_completed(
        &self,
        id: Uuid,
        activation: &Activation,
    ) -> AppResult<TransitionOutcome> {
        if let Some(window) = self.repo.complete_and_activate(id, activation).await? {
            tracing::info!(
                transaction_id = %id,
                subscription_id = %activation.subscription_id,
                start_date = %window.start_date,
                end_date = ?window.end_date,
                "Transaction completed and subscription activated"
            );
            return Ok(TransitionOutcome::Applied);
        }
        self.resolve_lost_transition(id, TransactionStatus::Completed)
            .await
    }

    pub async fn mark_failed(&self, id: Uuid) -> AppResult<TransitionOutcome> {
        self.guarded_transition(id, TransactionStatus::Pending, TransactionStatus::Failed)
            .await
    }

    /// Ledger-only refund. The provider-side refund is issued out of band.
    pub async fn mark_refunded(&self, id: Uuid) -> AppResult<TransitionOutcome> {
        self.guarded_transition(id, TransactionStatus::Completed, TransactionStatus::Refunded)
            .await
    }

    pub async fn summary(&self) -> AppResult<LedgerSummary> {
        self.repo.summary().await
    }

    async fn guarded_transition(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> AppResult<TransitionOutcome> {
        if self.repo.transition_status(id, from, to).await? {
            tracing::info!(transaction_id = %id, from = %from, to = %to, "Transaction status changed");
            return Ok(TransitionOutcome::Applied);
        }
        self.resolve_lost_transition(id, to).await
    }

    /// The conditional update matched nothing: either someone else already made
    /// the same move, or the requested move is not allowed from the current state.
    async fn resolve_lost_transition(
        &self,
        id: Uuid,
        requested: TransactionStatus,
    ) -> AppResult<TransitionOutcome> {
        let current = self.get(id).await?;
        if current.status == requested {
            tracing::debug!(transaction_id = %id, status = %requested, "Transition already applied");
            return Ok(TransitionOutcome::AlreadyApplied);
        }
        Err(AppError::LedgerConflict(format!(
            "transaction {} is {}, cannot become {}",
            id, current.status, requested
        )))
    }
}
