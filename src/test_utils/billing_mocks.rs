//! In-memory implementation of every billing repository trait.
//!
//! One mutex guards all tables so that the conditional updates the Postgres
//! adapter performs in a single statement or transaction are atomic here too.

use async_trait::async_trait;
use billing_types::Limit;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        ledger::{
            Activation, LedgerSummary, NewTransaction, PaymentTransactionProfile,
            PaymentTransactionRepoTrait, SubscriptionWindow,
        },
        plans::{NewPlan, PlanChanges, SubscriptionPlanProfile, SubscriptionPlanRepoTrait},
        reconciler::{EventDetails, WebhookEventProfile, WebhookEventRepoTrait},
        subscriptions::{UserSubscriptionProfile, UserSubscriptionRepoTrait},
        usage_meter::{QuotaInsert, UsageKind, UsageRecord, UsageRepoTrait},
    },
    domain::entities::{
        payment_provider::PaymentProvider, transaction_status::TransactionStatus,
        user_subscription::SubscriptionStatus, webhook_outcome::WebhookOutcome,
    },
};

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[derive(Default)]
struct StoreState {
    plans: HashMap<Uuid, SubscriptionPlanProfile>,
    subscriptions: HashMap<Uuid, UserSubscriptionProfile>,
    transactions: HashMap<Uuid, PaymentTransactionProfile>,
    events: Vec<WebhookEventProfile>,
    usage: Vec<UsageRecord>,
    activations: usize,
    fail_ledger_writes: bool,
}

// ============================================================================
// InMemoryBillingStore
// ============================================================================

#[derive(Default)]
pub struct InMemoryBillingStore {
    state: Mutex<StoreState>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plan(&self, plan: SubscriptionPlanProfile) {
        self.state.lock().unwrap().plans.insert(plan.id, plan);
    }

    pub fn insert_subscription(&self, sub: UserSubscriptionProfile) {
        self.state.lock().unwrap().subscriptions.insert(sub.id, sub);
    }

    pub fn subscription(&self, id: Uuid) -> Option<UserSubscriptionProfile> {
        self.state.lock().unwrap().subscriptions.get(&id).cloned()
    }

    pub fn subscriptions_for(&self, subscriber_id: Uuid) -> Vec<UserSubscriptionProfile> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.subscriber_id == subscriber_id)
            .cloned()
            .collect()
    }

    pub fn insert_transaction(&self, tx: PaymentTransactionProfile) {
        self.state.lock().unwrap().transactions.insert(tx.id, tx);
    }

    pub fn transaction(&self, id: Uuid) -> Option<PaymentTransactionProfile> {
        self.state.lock().unwrap().transactions.get(&id).cloned()
    }

    pub fn update_transaction(&self, id: Uuid, f: impl FnOnce(&mut PaymentTransactionProfile)) {
        if let Some(tx) = self.state.lock().unwrap().transactions.get_mut(&id) {
            f(tx);
        }
    }

    /// Oldest first.
    pub fn transactions_for(&self, subscriber_id: Uuid) -> Vec<PaymentTransactionProfile> {
        let mut txs: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .transactions
            .values()
            .filter(|t| t.subscriber_id == subscriber_id)
            .cloned()
            .collect();
        txs.sort_by_key(|t| t.created_at);
        txs
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    /// Number of successful complete-and-activate writes.
    pub fn activation_count(&self) -> usize {
        self.state.lock().unwrap().activations
    }

    pub fn insert_usage(&self, record: UsageRecord) {
        self.state.lock().unwrap().usage.push(record);
    }

    pub fn usage_count(&self, kind: UsageKind, subscriber_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .usage
            .iter()
            .filter(|u| u.kind == kind && u.subscriber_id == subscriber_id)
            .count()
    }

    pub fn webhook_event(&self, id: Uuid) -> Option<WebhookEventProfile> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn webhook_events(&self) -> Vec<WebhookEventProfile> {
        self.state.lock().unwrap().events.clone()
    }

    /// Make ledger transitions fail with a database error until reset.
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_ledger_writes = fail;
    }
}

fn injected_failure() -> AppError {
    AppError::Database("injected ledger failure".into())
}

// ============================================================================
// Plans
// ============================================================================

#[async_trait]
impl SubscriptionPlanRepoTrait for InMemoryBillingStore {
    async fn create(&self, plan: &NewPlan) -> AppResult<SubscriptionPlanProfile> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.plans.values().any(|p| {
            p.category == plan.category && p.tier == plan.tier && p.billing_cycle == plan.billing_cycle
        });
        if duplicate {
            return Err(AppError::InvalidInput("Resource already exists".into()));
        }

        let profile = SubscriptionPlanProfile {
            id: Uuid::new_v4(),
            category: plan.category.clone(),
            tier: plan.tier.clone(),
            name: plan.name.clone(),
            price_cents: plan.price_cents,
            currency: plan.currency.clone(),
            billing_cycle: plan.billing_cycle,
            post_limits: plan.post_limits.clone(),
            view_limits: plan.view_limits.clone(),
            is_active: true,
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        state.plans.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionPlanProfile>> {
        Ok(self.state.lock().unwrap().plans.get(&id).cloned())
    }

    async fn list(&self, active_only: bool) -> AppResult<Vec<SubscriptionPlanProfile>> {
        let mut plans: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .plans
            .values()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.price_cents.cmp(&b.price_cents))
        });
        Ok(plans)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &PlanChanges,
    ) -> AppResult<Option<SubscriptionPlanProfile>> {
        let mut state = self.state.lock().unwrap();
        let Some(plan) = state.plans.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(tier) = &changes.tier {
            plan.tier = tier.clone();
        }
        if let Some(name) = &changes.name {
            plan.name = name.clone();
        }
        if let Some(price) = changes.price_cents {
            plan.price_cents = price;
        }
        if let Some(currency) = &changes.currency {
            plan.currency = currency.clone();
        }
        if let Some(cycle) = changes.billing_cycle {
            plan.billing_cycle = cycle;
        }
        if let Some(limits) = &changes.post_limits {
            plan.post_limits = limits.clone();
        }
        if let Some(limits) = &changes.view_limits {
            plan.view_limits = limits.clone();
        }
        if let Some(active) = changes.is_active {
            plan.is_active = active;
        }
        plan.updated_at = Some(now());
        Ok(Some(plan.clone()))
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[async_trait]
impl UserSubscriptionRepoTrait for InMemoryBillingStore {
    async fn create_pending(
        &self,
        subscriber_id: Uuid,
        plan_id: Uuid,
        currency: &str,
    ) -> AppResult<UserSubscriptionProfile> {
        let sub = UserSubscriptionProfile {
            id: Uuid::new_v4(),
            subscriber_id,
            plan_id,
            status: SubscriptionStatus::Pending,
            start_date: None,
            end_date: None,
            amount_paid_cents: 0,
            currency: currency.to_string(),
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserSubscriptionProfile>> {
        Ok(self.subscription(id))
    }

    async fn find_reusable(
        &self,
        subscriber_id: Uuid,
        plan_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserSubscriptionProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.subscriber_id == subscriber_id && s.plan_id == plan_id)
            .filter(|s| s.status == SubscriptionStatus::Pending || s.is_active_at(now))
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
    ) -> AppResult<Vec<UserSubscriptionProfile>> {
        let mut subs = self.subscriptions_for(subscriber_id);
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }

    async fn list_active_by_subscriber(
        &self,
        subscriber_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Vec<UserSubscriptionProfile>> {
        Ok(self
            .subscriptions_for(subscriber_id)
            .into_iter()
            .filter(|s| s.status == SubscriptionStatus::Active)
            .filter(|s| s.end_date.is_none_or(|end| end > now))
            .collect())
    }

    async fn cancel(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.subscriptions.get_mut(&id) {
            Some(sub)
                if matches!(
                    sub.status,
                    SubscriptionStatus::Pending | SubscriptionStatus::Active
                ) =>
            {
                sub.status = SubscriptionStatus::Cancelled;
                sub.updated_at = Some(now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_lapsed(&self, now: NaiveDateTime) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for sub in state.subscriptions.values_mut() {
            if sub.status == SubscriptionStatus::Active && sub.end_date.is_some_and(|e| e <= now) {
                sub.status = SubscriptionStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[async_trait]
impl PaymentTransactionRepoTrait for InMemoryBillingStore {
    async fn create(&self, input: &NewTransaction) -> AppResult<PaymentTransactionProfile> {
        let tx = PaymentTransactionProfile {
            id: Uuid::new_v4(),
            provider: input.provider,
            provider_ref: None,
            subscriber_id: input.subscriber_id,
            subscription_id: input.subscription_id,
            plan_id: input.plan_id,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            status: TransactionStatus::Pending,
            metadata: input.metadata.clone(),
            created_at: Some(now()),
            paid_at: None,
            updated_at: Some(now()),
        };
        self.insert_transaction(tx.clone());
        Ok(tx)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentTransactionProfile>> {
        Ok(self.transaction(id))
    }

    async fn get_by_provider_ref(
        &self,
        provider: PaymentProvider,
        provider_ref: &str,
    ) -> AppResult<Option<PaymentTransactionProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .values()
            .find(|t| t.provider == provider && t.provider_ref.as_deref() == Some(provider_ref))
            .cloned())
    }

    async fn attach_provider_ref(&self, id: Uuid, provider_ref: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let tx = state.transactions.get_mut(&id).ok_or(AppError::NotFound)?;
        if tx.provider_ref.as_deref().is_some_and(|r| r != provider_ref) {
            return Err(AppError::LedgerConflict(format!(
                "transaction {} already carries a different provider reference",
                id
            )));
        }
        tx.provider_ref = Some(provider_ref.to_string());
        tx.updated_at = Some(now());
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.fail_ledger_writes {
            return Err(injected_failure());
        }
        match state.transactions.get_mut(&id) {
            Some(tx) if tx.status == from => {
                tx.status = to;
                tx.updated_at = Some(now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_and_activate(
        &self,
        id: Uuid,
        activation: &Activation,
    ) -> AppResult<Option<SubscriptionWindow>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_ledger_writes {
            return Err(injected_failure());
        }
        if !state
            .transactions
            .get(&id)
            .is_some_and(|tx| tx.status == TransactionStatus::Pending)
        {
            return Ok(None);
        }

        // Holding the lock plays the part of SELECT ... FOR UPDATE
        let window = activation.window(state.subscriptions.get(&activation.subscription_id))?;

        if let Some(tx) = state.transactions.get_mut(&id) {
            tx.status = TransactionStatus::Completed;
            tx.paid_at = Some(activation.paid_at);
            tx.subscription_id = Some(activation.subscription_id);
            tx.updated_at = Some(now());
        }

        let sub = state
            .subscriptions
            .entry(activation.subscription_id)
            .or_insert_with(|| UserSubscriptionProfile {
                id: activation.subscription_id,
                subscriber_id: activation.subscriber_id,
                plan_id: activation.plan_id,
                status: SubscriptionStatus::Pending,
                start_date: None,
                end_date: None,
                amount_paid_cents: 0,
                currency: activation.currency.clone(),
                created_at: Some(now()),
                updated_at: None,
            });
        sub.status = SubscriptionStatus::Active;
        sub.plan_id = activation.plan_id;
        sub.start_date = Some(window.start_date);
        sub.end_date = window.end_date;
        sub.amount_paid_cents += activation.amount_paid_cents;
        sub.currency = activation.currency.clone();
        sub.updated_at = Some(now());

        state.activations += 1;
        Ok(Some(window))
    }

    async fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
    ) -> AppResult<Vec<PaymentTransactionProfile>> {
        let mut txs = self.transactions_for(subscriber_id);
        txs.reverse();
        Ok(txs)
    }

    async fn summary(&self) -> AppResult<LedgerSummary> {
        let state = self.state.lock().unwrap();
        let mut summary = LedgerSummary::default();
        for tx in state.transactions.values() {
            match tx.status {
                TransactionStatus::Pending => summary.pending_count += 1,
                TransactionStatus::Completed => {
                    summary.completed_count += 1;
                    summary.revenue_cents += tx.amount_cents;
                }
                TransactionStatus::Failed => summary.failed_count += 1,
                TransactionStatus::Refunded => {
                    summary.refunded_count += 1;
                    summary.refunded_cents += tx.amount_cents;
                }
            }
        }
        Ok(summary)
    }
}

// ============================================================================
// Webhook events
// ============================================================================

#[async_trait]
impl WebhookEventRepoTrait for InMemoryBillingStore {
    async fn record(
        &self,
        provider: PaymentProvider,
        payload_raw: &str,
        signature: Option<&str>,
    ) -> AppResult<WebhookEventProfile> {
        let event = WebhookEventProfile {
            id: Uuid::new_v4(),
            provider,
            payload_raw: payload_raw.to_string(),
            signature: signature.map(str::to_string),
            event_type: None,
            provider_ref: None,
            processed: false,
            outcome: None,
            needs_review: false,
            attempts: 0,
            last_error: None,
            received_at: Some(now()),
            processed_at: None,
        };
        self.state.lock().unwrap().events.push(event.clone());
        Ok(event)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEventProfile>> {
        Ok(self.webhook_event(id))
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        outcome: WebhookOutcome,
        details: &EventDetails,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;
        event.processed = true;
        event.outcome = Some(outcome);
        event.needs_review = outcome.needs_review();
        event.event_type = details.event_type.clone();
        event.provider_ref = details.provider_ref.clone();
        event.processed_at = Some(now());
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        details: &EventDetails,
        error: &str,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;
        event.attempts += 1;
        event.last_error = Some(error.to_string());
        if details.event_type.is_some() {
            event.event_type = details.event_type.clone();
        }
        if details.provider_ref.is_some() {
            event.provider_ref = details.provider_ref.clone();
        }
        Ok(())
    }

    async fn list_unprocessed(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| !e.processed)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_needing_review(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .rev()
            .filter(|e| e.needs_review)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Usage
// ============================================================================

fn count_in_window(
    usage: &[UsageRecord],
    kind: UsageKind,
    subscriber_id: Uuid,
    category: &str,
    since: NaiveDateTime,
) -> u32 {
    usage
        .iter()
        .filter(|u| {
            u.kind == kind
                && u.subscriber_id == subscriber_id
                && u.category == category
                && u.at >= since
        })
        .count() as u32
}

#[async_trait]
impl UsageRepoTrait for InMemoryBillingStore {
    async fn count_usage(
        &self,
        kind: UsageKind,
        subscriber_id: Uuid,
        category: &str,
        since: NaiveDateTime,
    ) -> AppResult<u32> {
        let state = self.state.lock().unwrap();
        Ok(count_in_window(
            &state.usage,
            kind,
            subscriber_id,
            category,
            since,
        ))
    }

    async fn insert_within_quota(
        &self,
        record: &UsageRecord,
        limit: Limit,
        since: NaiveDateTime,
    ) -> AppResult<QuotaInsert> {
        let mut state = self.state.lock().unwrap();
        let used = count_in_window(
            &state.usage,
            record.kind,
            record.subscriber_id,
            &record.category,
            since,
        );

        let already = state.usage.iter().any(|u| {
            u.kind == record.kind
                && u.subscriber_id == record.subscriber_id
                && u.category == record.category
                && u.listing_id == record.listing_id
                && u.at >= since
        });
        if already {
            return Ok(QuotaInsert::AlreadyRecorded { used });
        }
        if !limit.permits(used) {
            return Ok(QuotaInsert::LimitReached { used });
        }

        state.usage.push(record.clone());
        Ok(QuotaInsert::Inserted { used: used + 1 })
    }
}
