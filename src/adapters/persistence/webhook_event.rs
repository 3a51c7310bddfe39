use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::reconciler::{EventDetails, WebhookEventProfile, WebhookEventRepoTrait},
    domain::entities::{payment_provider::PaymentProvider, webhook_outcome::WebhookOutcome},
};

/// Longest `last_error` kept per event.
const MAX_ERROR_LEN: usize = 1000;

fn row_to_profile(row: sqlx::postgres::PgRow) -> WebhookEventProfile {
    WebhookEventProfile {
        id: row.get("id"),
        provider: row.get::<PaymentProvider, _>("provider"),
        payload_raw: row.get("payload_raw"),
        signature: row.get("signature"),
        event_type: row.get("event_type"),
        provider_ref: row.get("provider_ref"),
        processed: row.get("processed"),
        outcome: row.get::<Option<WebhookOutcome>, _>("outcome"),
        needs_review: row.get("needs_review"),
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        received_at: row.get("received_at"),
        processed_at: row.get("processed_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, provider, payload_raw, signature, event_type, provider_ref, processed,
    outcome, needs_review, attempts, last_error, received_at, processed_at
"#;

fn truncate(error: &str) -> &str {
    match error.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => &error[..idx],
        None => error,
    }
}

#[async_trait]
impl WebhookEventRepoTrait for PostgresPersistence {
    async fn record(
        &self,
        provider: PaymentProvider,
        payload_raw: &str,
        signature: Option<&str>,
    ) -> AppResult<WebhookEventProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO webhook_events (id, provider, payload_raw, signature)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(payload_raw)
        .bind(signature)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEventProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM webhook_events WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        outcome: WebhookOutcome,
        details: &EventDetails,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                processed = true,
                outcome = $2,
                needs_review = $3,
                event_type = $4,
                provider_ref = $5,
                processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(outcome)
        .bind(outcome.needs_review())
        .bind(&details.event_type)
        .bind(&details.provider_ref)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        details: &EventDetails,
        error: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                attempts = attempts + 1,
                last_error = $2,
                event_type = COALESCE($3, event_type),
                provider_ref = COALESCE($4, provider_ref)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(truncate(error))
        .bind(&details.event_type)
        .bind(&details.provider_ref)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn list_unprocessed(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM webhook_events WHERE NOT processed ORDER BY received_at ASC LIMIT $1",
            SELECT_COLS
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn list_needing_review(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM webhook_events WHERE needs_review ORDER BY received_at DESC LIMIT $1",
            SELECT_COLS
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }
}
