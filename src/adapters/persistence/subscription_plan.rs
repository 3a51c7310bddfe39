use async_trait::async_trait;
use billing_types::{CategoryLimits, decode_category_limits, encode_category_limits};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::plans::{
        NewPlan, PlanChanges, SubscriptionPlanProfile, SubscriptionPlanRepoTrait,
    },
    domain::entities::billing_cycle::BillingCycle,
};

/// Stored limits are decoded leniently: an unrecognised value drops its
/// category (not granted) rather than failing the whole plan.
fn limits_from_row(row: &sqlx::postgres::PgRow, column: &str, plan_id: Uuid) -> CategoryLimits {
    let raw: serde_json::Value = row.get(column);
    let limits = decode_category_limits(&raw);
    let stored = raw.as_object().map(|o| o.len()).unwrap_or(0);
    if stored != limits.len() {
        tracing::warn!(
            plan_id = %plan_id,
            field = column,
            raw_json = %raw,
            "Dropped undecodable plan limits"
        );
    }
    limits
}

fn row_to_profile(row: sqlx::postgres::PgRow) -> SubscriptionPlanProfile {
    let id: Uuid = row.get("id");
    let post_limits = limits_from_row(&row, "post_limits", id);
    let view_limits = limits_from_row(&row, "view_limits", id);

    SubscriptionPlanProfile {
        id,
        category: row.get("category"),
        tier: row.get("tier"),
        name: row.get("name"),
        price_cents: row.get("price_cents"),
        currency: row.get("currency"),
        billing_cycle: row.get::<BillingCycle, _>("billing_cycle"),
        post_limits,
        view_limits,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, category, tier, name, price_cents, currency, billing_cycle,
    post_limits, view_limits, is_active, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionPlanRepoTrait for PostgresPersistence {
    async fn create(&self, plan: &NewPlan) -> AppResult<SubscriptionPlanProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscription_plans
                (id, category, tier, name, price_cents, currency, billing_cycle, post_limits, view_limits)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&plan.category)
        .bind(&plan.tier)
        .bind(&plan.name)
        .bind(plan.price_cents)
        .bind(&plan.currency)
        .bind(plan.billing_cycle)
        .bind(encode_category_limits(&plan.post_limits))
        .bind(encode_category_limits(&plan.view_limits))
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionPlanProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_plans WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list(&self, active_only: bool) -> AppResult<Vec<SubscriptionPlanProfile>> {
        let query = if active_only {
            format!(
                "SELECT {} FROM subscription_plans WHERE is_active = true ORDER BY category, price_cents, created_at",
                SELECT_COLS
            )
        } else {
            format!(
                "SELECT {} FROM subscription_plans ORDER BY category, price_cents, created_at",
                SELECT_COLS
            )
        };
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &PlanChanges,
    ) -> AppResult<Option<SubscriptionPlanProfile>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscription_plans SET
                tier = COALESCE($2, tier),
                name = COALESCE($3, name),
                price_cents = COALESCE($4, price_cents),
                currency = COALESCE($5, currency),
                billing_cycle = COALESCE($6, billing_cycle),
                post_limits = COALESCE($7, post_limits),
                view_limits = COALESCE($8, view_limits),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&changes.tier)
        .bind(&changes.name)
        .bind(changes.price_cents)
        .bind(&changes.currency)
        .bind(changes.billing_cycle)
        .bind(changes.post_limits.as_ref().map(encode_category_limits))
        .bind(changes.view_limits.as_ref().map(encode_category_limits))
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }
}
