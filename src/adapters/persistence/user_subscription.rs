use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscriptions::{UserSubscriptionProfile, UserSubscriptionRepoTrait},
    domain::entities::user_subscription::SubscriptionStatus,
};

pub(super) fn row_to_profile(row: sqlx::postgres::PgRow) -> UserSubscriptionProfile {
    UserSubscriptionProfile {
        id: row.get("id"),
        subscriber_id: row.get("subscriber_id"),
        plan_id: row.get("plan_id"),
        status: row.get::<SubscriptionStatus, _>("status"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        amount_paid_cents: row.get("amount_paid_cents"),
        currency: row.get("currency"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) const SELECT_COLS: &str = r#"
    id, subscriber_id, plan_id, status, start_date, end_date,
    amount_paid_cents, currency, created_at, updated_at
"#;

#[async_trait]
impl UserSubscriptionRepoTrait for PostgresPersistence {
    async fn create_pending(
        &self,
        subscriber_id: Uuid,
        plan_id: Uuid,
        currency: &str,
    ) -> AppResult<UserSubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_subscriptions (id, subscriber_id, plan_id, status, currency)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(subscriber_id)
        .bind(plan_id)
        .bind(currency)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserSubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn find_reusable(
        &self,
        subscriber_id: Uuid,
        plan_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserSubscriptionProfile>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM user_subscriptions
            WHERE subscriber_id = $1 AND plan_id = $2
              AND (status = 'pending'
                   OR (status = 'active' AND (end_date IS NULL OR end_date > $3)))
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(subscriber_id)
        .bind(plan_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
    ) -> AppResult<Vec<UserSubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_subscriptions WHERE subscriber_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn list_active_by_subscriber(
        &self,
        subscriber_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Vec<UserSubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM user_subscriptions
            WHERE subscriber_id = $1 AND status = 'active'
              AND (end_date IS NULL OR end_date > $2)
            ORDER BY start_date
            "#,
            SELECT_COLS
        ))
        .bind(subscriber_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn cancel(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'active')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn expire_lapsed(&self, now: NaiveDateTime) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND end_date IS NOT NULL AND end_date <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
