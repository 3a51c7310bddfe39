use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::user_subscription::SubscriptionStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSubscriptionProfile {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    /// Set on first activation; billing periods and usage windows step from it
    pub start_date: Option<NaiveDateTime>,
    /// `None` for lifetime plans (and before activation)
    pub end_date: Option<NaiveDateTime>,
    pub amount_paid_cents: i64,
    pub currency: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl UserSubscriptionProfile {
    pub fn effective_status(&self, now: NaiveDateTime) -> SubscriptionStatus {
        self.status.effective(self.end_date, now)
    }

    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.effective_status(now).grants_access()
    }
}

#[async_trait]
pub trait UserSubscriptionRepoTrait: Send + Sync {
    async fn create_pending(
        &self,
        subscriber_id: Uuid,
        plan_id: Uuid,
        currency: &str,
    ) -> AppResult<UserSubscriptionProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserSubscriptionProfile>>;

    /// Most recent subscription to `plan_id` that is pending or still active at `now`.
    async fn find_reusable(
        &self,
        subscriber_id: Uuid,
        plan_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserSubscriptionProfile>>;

    async fn list_by_subscriber(&self, subscriber_id: Uuid)
    -> AppResult<Vec<UserSubscriptionProfile>>;

    /// Active rows whose end date (if any) is after `now`.
    async fn list_active_by_subscriber(
        &self,
        subscriber_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Vec<UserSubscriptionProfile>>;

    /// Conditional cancel of a pending or active row. Returns false when the row moved on.
    async fn cancel(&self, id: Uuid) -> AppResult<bool>;

    /// Persist lazily computed expiry. Returns the number of rows updated.
    async fn expire_lapsed(&self, now: NaiveDateTime) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn UserSubscriptionRepoTrait>,
}

impl SubscriptionUseCases {
    pub fn new(repo: Arc<dyn UserSubscriptionRepoTrait>) -> Self {
        Self { repo }
    }

    /// Subscriptions for one subscriber with lazily computed expiry applied.
    pub async fn list_for_subscriber(
        &self,
        subscriber_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Vec<UserSubscriptionProfile>> {
        let subs = self.repo.list_by_subscriber(subscriber_id).await?;
        Ok(subs
            .into_iter()
            .map(|mut s| {
                s.status = s.effective_status(now);
                s
            })
            .collect())
    }

    pub async fn cancel_subscription(
        &self,
        id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<UserSubscriptionProfile> {
        let sub = self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        let status = sub.effective_status(now);
        if !status.can_cancel() {
            return Err(AppError::InvalidInput(format!(
                "Subscription is {} and cannot be cancelled",
                status
            )));
        }

        if !self.repo.cancel(id).await? {
            return Err(AppError::InvalidInput(
                "Subscription changed state while cancelling".into(),
            ));
        }

        tracing::info!(subscription_id = %id, previous_status = %status, "Subscription cancelled");
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn expire_lapsed(&self, now: NaiveDateTime) -> AppResult<u64> {
        let expired = self.repo.expire_lapsed(now).await?;
        if expired > 0 {
            tracing::info!(count = expired, "Persisted expiry for lapsed subscriptions");
        }
        Ok(expired)
    }
}
