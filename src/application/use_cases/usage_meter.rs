use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use billing_types::{Limit, QuotaDisplay, UsageResponse};
use chrono::NaiveDateTime;
use serde::Serialize;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

use super::{plans::PlanUseCases, subscriptions::UserSubscriptionRepoTrait};

// ============================================================================
// Types
// ============================================================================

/// Kind of consumption a quota meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UsageKind {
    Post,
    View,
}

/// Limit in force for one category and where its usage window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub limit: Limit,
    pub window_start: NaiveDateTime,
}

/// Combined limits across all of a subscriber's active subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveLimits {
    pub posts: BTreeMap<String, Grant>,
    pub views: BTreeMap<String, Grant>,
}

impl EffectiveLimits {
    pub fn grants(&self, kind: UsageKind) -> &BTreeMap<String, Grant> {
        match kind {
            UsageKind::Post => &self.posts,
            UsageKind::View => &self.views,
        }
    }
}

/// One unit of consumption to record.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub kind: UsageKind,
    pub subscriber_id: Uuid,
    pub category: String,
    pub listing_id: Uuid,
    pub at: NaiveDateTime,
}

/// Result of an atomic check-and-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaInsert {
    /// Row written; `used` includes it
    Inserted { used: u32 },
    /// Same listing already recorded in this window; nothing written
    AlreadyRecorded { used: u32 },
    /// Bound reached; nothing written
    LimitReached { used: u32 },
}

#[async_trait]
pub trait UsageRepoTrait: Send + Sync {
    /// Rows of `kind` for subscriber and category since `since` (inclusive).
    async fn count_usage(
        &self,
        kind: UsageKind,
        subscriber_id: Uuid,
        category: &str,
        since: NaiveDateTime,
    ) -> AppResult<u32>;

    /// Re-count and insert inside one atomic unit so that concurrent callers
    /// cannot both consume the last remaining unit.
    async fn insert_within_quota(
        &self,
        record: &UsageRecord,
        limit: Limit,
        since: NaiveDateTime,
    ) -> AppResult<QuotaInsert>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct UsageMeterUseCases {
    plans: Arc<PlanUseCases>,
    subscriptions: Arc<dyn UserSubscriptionRepoTrait>,
    usage: Arc<dyn UsageRepoTrait>,
}

impl UsageMeterUseCases {
    pub fn new(
        plans: Arc<PlanUseCases>,
        subscriptions: Arc<dyn UserSubscriptionRepoTrait>,
        usage: Arc<dyn UsageRepoTrait>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            usage,
        }
    }

    /// Limits in force at `now`. Display and enforcement both go through here.
    ///
    /// Several active subscriptions granting the same category combine by
    /// maximum, `Unlimited` dominating. The usage window is the current billing
    /// period of the subscription supplying the winning limit; on a tie the
    /// earliest window start wins.
    pub async fn effective_limits(
        &self,
        subscriber_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<EffectiveLimits> {
        let subs = self
            .subscriptions
            .list_active_by_subscriber(subscriber_id, now)
            .await?;

        let mut limits = EffectiveLimits::default();
        for sub in subs {
            if !sub.is_active_at(now) {
                continue;
            }
            let plan = match self.plans.get_plan(sub.plan_id).await {
                Ok(plan) => plan,
                Err(AppError::NotFound) => {
                    tracing::warn!(
                        subscription_id = %sub.id,
                        plan_id = %sub.plan_id,
                        "Active subscription references a missing plan"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            // Usage resets at every billing period, including renewed ones
            let window_start = sub
                .start_date
                .map(|anchor| plan.billing_cycle.period_start(anchor, now))
                .unwrap_or(now);

            for (category, limit) in &plan.post_limits {
                merge_grant(&mut limits.posts, category, *limit, window_start);
            }
            for (category, limit) in &plan.view_limits {
                merge_grant(&mut limits.views, category, *limit, window_start);
            }
        }
        Ok(limits)
    }

    /// Usage counts and quota display for every granted category.
    pub async fn get_usage(&self, subscriber_id: Uuid, now: NaiveDateTime) -> AppResult<UsageResponse> {
        let limits = self.effective_limits(subscriber_id, now).await?;
        let mut report = UsageResponse::default();

        for (category, grant) in &limits.posts {
            let used = self
                .usage
                .count_usage(UsageKind::Post, subscriber_id, category, grant.window_start)
                .await?;
            report.post_usage.insert(category.clone(), used);
            report
                .post_quotas
                .push(QuotaDisplay::new(category.clone(), grant.limit, used));
        }
        for (category, grant) in &limits.views {
            let used = self
                .usage
                .count_usage(UsageKind::View, subscriber_id, category, grant.window_start)
                .await?;
            report.view_usage.insert(category.clone(), used);
            report
                .view_quotas
                .push(QuotaDisplay::new(category.clone(), grant.limit, used));
        }
        Ok(report)
    }

    /// Read-only quota check for a single category.
    pub async fn check(
        &self,
        kind: UsageKind,
        subscriber_id: Uuid,
        category: &str,
        now: NaiveDateTime,
    ) -> AppResult<QuotaDisplay> {
        let limits = self.effective_limits(subscriber_id, now).await?;
        let grant = granted(&limits, kind, category)?;
        let used = self
            .usage
            .count_usage(kind, subscriber_id, category, grant.window_start)
            .await?;
        if !grant.limit.permits(used) {
            return Err(exceeded(category, grant.limit));
        }
        Ok(QuotaDisplay::new(category, grant.limit, used))
    }

    /// Server-side gate for publishing a listing.
    pub async fn create_post(
        &self,
        subscriber_id: Uuid,
        category: &str,
        listing_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<QuotaDisplay> {
        self.consume(UsageKind::Post, subscriber_id, category, listing_id, now)
            .await
    }

    /// Server-side gate for opening a listing's details.
    pub async fn record_view(
        &self,
        subscriber_id: Uuid,
        category: &str,
        listing_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<QuotaDisplay> {
        self.consume(UsageKind::View, subscriber_id, category, listing_id, now)
            .await
    }

    async fn consume(
        &self,
        kind: UsageKind,
        subscriber_id: Uuid,
        category: &str,
        listing_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<QuotaDisplay> {
        let category = category.trim();
        if category.is_empty() {
            return Err(AppError::InvalidInput("category is required".into()));
        }

        let limits = self.effective_limits(subscriber_id, now).await?;
        let grant = granted(&limits, kind, category)?;

        let record = UsageRecord {
            kind,
            subscriber_id,
            category: category.to_string(),
            listing_id,
            at: now,
        };

        match self
            .usage
            .insert_within_quota(&record, grant.limit, grant.window_start)
            .await?
        {
            QuotaInsert::Inserted { used } | QuotaInsert::AlreadyRecorded { used } => {
                Ok(QuotaDisplay::new(category, grant.limit, used))
            }
            QuotaInsert::LimitReached { used } => {
                tracing::info!(
                    subscriber_id = %subscriber_id,
                    category,
                    kind = %kind,
                    used,
                    "Quota exhausted"
                );
                Err(exceeded(category, grant.limit))
            }
        }
    }
}

fn merge_grant(
    grants: &mut BTreeMap<String, Grant>,
    category: &str,
    limit: Limit,
    window_start: NaiveDateTime,
) {
    let candidate = Grant {
        limit,
        window_start,
    };
    grants
        .entry(category.to_string())
        .and_modify(|current| {
            if candidate.limit > current.limit
                || (candidate.limit == current.limit && candidate.window_start < current.window_start)
            {
                *current = candidate;
            }
        })
        .or_insert(candidate);
}

fn granted(limits: &EffectiveLimits, kind: UsageKind, category: &str) -> AppResult<Grant> {
    limits
        .grants(kind)
        .get(category)
        .copied()
        .ok_or_else(|| AppError::QuotaDenied {
            category: category.to_string(),
        })
}

fn exceeded(category: &str, limit: Limit) -> AppError {
    let limit = match limit {
        Limit::Bounded(n) => n,
        Limit::Unlimited => u32::MAX,
    };
    AppError::QuotaExceeded {
        category: category.to_string(),
        limit,
    }
}
