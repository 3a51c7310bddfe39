use async_trait::async_trait;
use billing_types::Limit;
use chrono::NaiveDateTime;
use sqlx::{Postgres, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::usage_meter::{QuotaInsert, UsageKind, UsageRecord, UsageRepoTrait},
};

fn table(kind: UsageKind) -> &'static str {
    match kind {
        UsageKind::Post => "listing_posts",
        UsageKind::View => "listing_views",
    }
}

fn to_count(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

/// Serialises gate checks per subscriber, category and kind for the rest of
/// the surrounding transaction.
fn lock_key(record: &UsageRecord) -> String {
    format!(
        "usage:{}:{}:{}",
        record.kind, record.subscriber_id, record.category
    )
}

async fn count_in<'e, E>(
    executor: E,
    kind: UsageKind,
    subscriber_id: Uuid,
    category: &str,
    since: NaiveDateTime,
) -> AppResult<u32>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!(
        "SELECT COUNT(*) AS used FROM {} WHERE subscriber_id = $1 AND category = $2 AND created_at >= $3",
        table(kind)
    ))
    .bind(subscriber_id)
    .bind(category)
    .bind(since)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)?;
    Ok(to_count(row.get("used")))
}

#[async_trait]
impl UsageRepoTrait for PostgresPersistence {
    async fn count_usage(
        &self,
        kind: UsageKind,
        subscriber_id: Uuid,
        category: &str,
        since: NaiveDateTime,
    ) -> AppResult<u32> {
        count_in(&self.pool, kind, subscriber_id, category, since).await
    }

    async fn insert_within_quota(
        &self,
        record: &UsageRecord,
        limit: Limit,
        since: NaiveDateTime,
    ) -> AppResult<QuotaInsert> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(lock_key(record))
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        let used = count_in(
            &mut *tx,
            record.kind,
            record.subscriber_id,
            &record.category,
            since,
        )
        .await?;

        let already: bool = sqlx::query_scalar(&format!(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM {}
                WHERE subscriber_id = $1 AND category = $2 AND listing_id = $3 AND created_at >= $4
            )
            "#,
            table(record.kind)
        ))
        .bind(record.subscriber_id)
        .bind(&record.category)
        .bind(record.listing_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if already {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(QuotaInsert::AlreadyRecorded { used });
        }
        if !limit.permits(used) {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(QuotaInsert::LimitReached { used });
        }

        sqlx::query(&format!(
            "INSERT INTO {} (id, subscriber_id, category, listing_id, created_at) VALUES ($1, $2, $3, $4, $5)",
            table(record.kind)
        ))
        .bind(Uuid::new_v4())
        .bind(record.subscriber_id)
        .bind(&record.category)
        .bind(record.listing_id)
        .bind(record.at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(QuotaInsert::Inserted { used: used + 1 })
    }
}
