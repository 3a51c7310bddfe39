use std::sync::Arc;

use async_trait::async_trait;
use billing_types::{CategoryLimits, Limit};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::billing_cycle::BillingCycle,
};

// ============================================================================
// Profiles & Inputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionPlanProfile {
    pub id: Uuid,
    /// Marketplace partition the plan is sold in
    pub category: String,
    pub tier: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub post_limits: CategoryLimits,
    pub view_limits: CategoryLimits,
    pub is_active: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Admin request to create a plan. Limits arrive in their raw JSON form.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanInput {
    pub category: String,
    pub tier: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub post_limits: JsonValue,
    #[serde(default)]
    pub view_limits: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanInput {
    pub tier: Option<String>,
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub post_limits: Option<JsonValue>,
    pub view_limits: Option<JsonValue>,
    pub is_active: Option<bool>,
}

/// Validated plan ready to persist.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub category: String,
    pub tier: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub post_limits: CategoryLimits,
    pub view_limits: CategoryLimits,
}

/// Validated partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PlanChanges {
    pub tier: Option<String>,
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub post_limits: Option<CategoryLimits>,
    pub view_limits: Option<CategoryLimits>,
    pub is_active: Option<bool>,
}

// ============================================================================
// Ports
// ============================================================================

#[async_trait]
pub trait SubscriptionPlanRepoTrait: Send + Sync {
    async fn create(&self, plan: &NewPlan) -> AppResult<SubscriptionPlanProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionPlanProfile>>;

    async fn list(&self, active_only: bool) -> AppResult<Vec<SubscriptionPlanProfile>>;

    async fn update(
        &self,
        id: Uuid,
        changes: &PlanChanges,
    ) -> AppResult<Option<SubscriptionPlanProfile>>;
}

/// Read-through cache for plan definitions.
///
/// Every write through `PlanUseCases` invalidates the affected entries.
pub trait PlanCache: Send + Sync {
    fn get(&self, id: Uuid) -> Option<SubscriptionPlanProfile>;

    fn put(&self, plan: SubscriptionPlanProfile);

    fn get_active_list(&self) -> Option<Vec<SubscriptionPlanProfile>>;

    fn put_active_list(&self, plans: Vec<SubscriptionPlanProfile>);

    /// Drop the plan and the cached active list.
    fn invalidate(&self, id: Uuid);
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PlanUseCases {
    repo: Arc<dyn SubscriptionPlanRepoTrait>,
    cache: Arc<dyn PlanCache>,
}

impl PlanUseCases {
    pub fn new(repo: Arc<dyn SubscriptionPlanRepoTrait>, cache: Arc<dyn PlanCache>) -> Self {
        Self { repo, cache }
    }

    /// Live plan definition, served from cache when fresh.
    pub async fn get_plan(&self, id: Uuid) -> AppResult<SubscriptionPlanProfile> {
        if let Some(plan) = self.cache.get(id) {
            return Ok(plan);
        }
        let plan = self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        self.cache.put(plan.clone());
        Ok(plan)
    }

    pub async fn list_active_plans(&self) -> AppResult<Vec<SubscriptionPlanProfile>> {
        if let Some(plans) = self.cache.get_active_list() {
            return Ok(plans);
        }
        let plans = self.repo.list(true).await?;
        self.cache.put_active_list(plans.clone());
        Ok(plans)
    }

    /// All plans including inactive ones. Never cached.
    pub async fn list_plans(&self) -> AppResult<Vec<SubscriptionPlanProfile>> {
        self.repo.list(false).await
    }

    pub async fn create_plan(&self, input: CreatePlanInput) -> AppResult<SubscriptionPlanProfile> {
        let plan = NewPlan {
            category: required_text("category", &input.category)?,
            tier: required_text("tier", &input.tier)?,
            name: required_text("name", &input.name)?,
            price_cents: validate_price(input.price_cents)?,
            currency: normalize_currency(&input.currency)?,
            billing_cycle: input.billing_cycle,
            post_limits: decode_limits_strict("post_limits", &input.post_limits)?,
            view_limits: decode_limits_strict("view_limits", &input.view_limits)?,
        };

        let created = self.repo.create(&plan).await?;
        self.cache.invalidate(created.id);

        tracing::info!(
            plan_id = %created.id,
            category = %created.category,
            tier = %created.tier,
            billing_cycle = %created.billing_cycle,
            "Subscription plan created"
        );
        Ok(created)
    }

    pub async fn update_plan(
        &self,
        id: Uuid,
        input: UpdatePlanInput,
    ) -> AppResult<SubscriptionPlanProfile> {
        let changes = PlanChanges {
            tier: input
                .tier
                .as_deref()
                .map(|t| required_text("tier", t))
                .transpose()?,
            name: input
                .name
                .as_deref()
                .map(|n| required_text("name", n))
                .transpose()?,
            price_cents: input.price_cents.map(validate_price).transpose()?,
            currency: input
                .currency
                .as_deref()
                .map(normalize_currency)
                .transpose()?,
            billing_cycle: input.billing_cycle,
            post_limits: input
                .post_limits
                .as_ref()
                .map(|raw| decode_limits_strict("post_limits", raw))
                .transpose()?,
            view_limits: input
                .view_limits
                .as_ref()
                .map(|raw| decode_limits_strict("view_limits", raw))
                .transpose()?,
            is_active: input.is_active,
        };

        let updated = self
            .repo
            .update(id, &changes)
            .await?
            .ok_or(AppError::NotFound)?;
        self.cache.invalidate(id);

        tracing::info!(plan_id = %id, is_active = updated.is_active, "Subscription plan updated");
        Ok(updated)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> AppResult<SubscriptionPlanProfile> {
        self.update_plan(
            id,
            UpdatePlanInput {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

fn required_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn validate_price(price_cents: i64) -> AppResult<i64> {
    if price_cents < 0 {
        return Err(AppError::InvalidInput(
            "price_cents must not be negative".into(),
        ));
    }
    Ok(price_cents)
}

fn normalize_currency(currency: &str) -> AppResult<String> {
    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidInput(format!(
            "Invalid currency code: {}",
            currency
        )));
    }
    Ok(currency.to_ascii_lowercase())
}

/// Admin input is decoded strictly: unknown spellings are rejected instead of
/// silently dropping the category.
fn decode_limits_strict(field: &str, raw: &JsonValue) -> AppResult<CategoryLimits> {
    let obj = match raw {
        JsonValue::Null => return Ok(CategoryLimits::new()),
        JsonValue::Object(obj) => obj,
        _ => {
            return Err(AppError::InvalidInput(format!(
                "{} must be an object of category to limit",
                field
            )));
        }
    };

    let mut limits = CategoryLimits::new();
    for (category, value) in obj {
        let limit: Option<Limit> = Limit::try_from_raw(value)
            .map_err(|e| AppError::InvalidInput(format!("{}.{}: {}", field, category, e)))?;
        if let Some(limit) = limit {
            limits.insert(category.clone(), limit);
        }
    }
    Ok(limits)
}
