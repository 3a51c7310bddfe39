use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, user_subscription},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::{
        Activation, LedgerSummary, NewTransaction, PaymentTransactionProfile,
        PaymentTransactionRepoTrait, SubscriptionWindow,
    },
    domain::entities::{payment_provider::PaymentProvider, transaction_status::TransactionStatus},
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PaymentTransactionProfile {
    PaymentTransactionProfile {
        id: row.get("id"),
        provider: row.get::<PaymentProvider, _>("provider"),
        provider_ref: row.get("provider_ref"),
        subscriber_id: row.get("subscriber_id"),
        subscription_id: row.get("subscription_id"),
        plan_id: row.get("plan_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: row.get::<TransactionStatus, _>("status"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        paid_at: row.get("paid_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, provider, provider_ref, subscriber_id, subscription_id, plan_id,
    amount_cents, currency, status, metadata, created_at, paid_at, updated_at
"#;

#[async_trait]
impl PaymentTransactionRepoTrait for PostgresPersistence {
    async fn create(&self, input: &NewTransaction) -> AppResult<PaymentTransactionProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_transactions
                (id, provider, subscriber_id, subscription_id, plan_id, amount_cents, currency, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(input.provider)
        .bind(input.subscriber_id)
        .bind(input.subscription_id)
        .bind(input.plan_id)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentTransactionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_transactions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn get_by_provider_ref(
        &self,
        provider: PaymentProvider,
        provider_ref: &str,
    ) -> AppResult<Option<PaymentTransactionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_transactions WHERE provider = $1 AND provider_ref = $2",
            SELECT_COLS
        ))
        .bind(provider)
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn attach_provider_ref(&self, id: Uuid, provider_ref: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET provider_ref = $2, updated_at = NOW()
            WHERE id = $1 AND (provider_ref IS NULL OR provider_ref = $2)
            "#,
        )
        .bind(id)
        .bind(provider_ref)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                None => Err(AppError::NotFound),
                Some(_) => Err(AppError::LedgerConflict(format!(
                    "transaction {} already carries a different provider reference",
                    id
                ))),
            };
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_and_activate(
        &self,
        id: Uuid,
        activation: &Activation,
    ) -> AppResult<Option<SubscriptionWindow>> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let completed = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = 'completed', paid_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(activation.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if completed.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(None);
        }

        // Serializes concurrent renewals of the same subscription
        let current = sqlx::query(&format!(
            "SELECT {} FROM user_subscriptions WHERE id = $1 FOR UPDATE",
            user_subscription::SELECT_COLS
        ))
        .bind(activation.subscription_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .map(user_subscription::row_to_profile);

        let window = activation.window(current.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO user_subscriptions
                (id, subscriber_id, plan_id, status, start_date, end_date, amount_paid_cents, currency)
            VALUES ($1, $2, $3, 'active', $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = 'active',
                plan_id = EXCLUDED.plan_id,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                amount_paid_cents = user_subscriptions.amount_paid_cents + EXCLUDED.amount_paid_cents,
                currency = EXCLUDED.currency,
                updated_at = NOW()
            "#,
        )
        .bind(activation.subscription_id)
        .bind(activation.subscriber_id)
        .bind(activation.plan_id)
        .bind(window.start_date)
        .bind(window.end_date)
        .bind(activation.amount_paid_cents)
        .bind(&activation.currency)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        sqlx::query("UPDATE payment_transactions SET subscription_id = $2 WHERE id = $1")
            .bind(id)
            .bind(activation.subscription_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(Some(window))
    }

    async fn list_by_subscriber(
        &self,
        subscriber_id: Uuid,
    ) -> AppResult<Vec<PaymentTransactionProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_transactions WHERE subscriber_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn summary(&self) -> AppResult<LedgerSummary> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(amount_cents), 0)::BIGINT AS total
            FROM payment_transactions
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let mut summary = LedgerSummary::default();
        for row in rows {
            let count: i64 = row.get("count");
            let total: i64 = row.get("total");
            match row.get::<TransactionStatus, _>("status") {
                TransactionStatus::Pending => summary.pending_count = count,
                TransactionStatus::Completed => {
                    summary.completed_count = count;
                    summary.revenue_cents = total;
                }
                TransactionStatus::Failed => summary.failed_count = count,
                TransactionStatus::Refunded => {
                    summary.refunded_count = count;
                    summary.refunded_cents = total;
                }
            }
        }
        Ok(summary)
    }
}
