use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use billing_types::SettlementStatus;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{ProviderRef, WebhookPayload},
    domain::entities::{
        payment_provider::PaymentProvider, transaction_status::TransactionStatus,
        webhook_outcome::WebhookOutcome,
    },
};

use super::{
    activator::SubscriptionActivator,
    ledger::{LedgerUseCases, PaymentTransactionProfile, TransitionOutcome},
    payment_provider_registry::PaymentProviderRegistry,
};

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEventProfile {
    pub id: Uuid,
    pub provider: PaymentProvider,
    #[serde(skip_serializing)]
    pub payload_raw: String,
    #[serde(skip_serializing)]
    pub signature: Option<String>,
    pub event_type: Option<String>,
    pub provider_ref: Option<String>,
    pub processed: bool,
    pub outcome: Option<WebhookOutcome>,
    pub needs_review: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub received_at: Option<NaiveDateTime>,
    pub processed_at: Option<NaiveDateTime>,
}

/// Fields derived from a payload once the adapter has decoded it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    pub event_type: Option<String>,
    pub provider_ref: Option<String>,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookReceipt {
    pub event_id: Uuid,
    /// `None` while the event awaits replay
    pub outcome: Option<WebhookOutcome>,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyResult {
    pub transaction_id: Uuid,
    pub status: SettlementStatus,
    pub transaction_status: TransactionStatus,
    pub outcome: WebhookOutcome,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait WebhookEventRepoTrait: Send + Sync {
    /// Persist the raw callback before anything else looks at it.
    async fn record(
        &self,
        provider: PaymentProvider,
        payload_raw: &str,
        signature: Option<&str>,
    ) -> AppResult<WebhookEventProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEventProfile>>;

    /// Close the event. `needs_review` follows from the outcome.
    async fn mark_processed(
        &self,
        id: Uuid,
        outcome: WebhookOutcome,
        details: &EventDetails,
    ) -> AppResult<()>;

    /// Bump `attempts` and store the error, leaving the event open for replay.
    async fn record_failed_attempt(
        &self,
        id: Uuid,
        details: &EventDetails,
        error: &str,
    ) -> AppResult<()>;

    /// Oldest first.
    async fn list_unprocessed(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>>;

    /// Newest first.
    async fn list_needing_review(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>>;
}

// ============================================================================
// Use Cases
// ============================================================================

/// Drives provider reports (pushed webhooks or pulled verifications) through
/// the ledger state machine.
#[derive(Clone)]
pub struct ReconcilerUseCases {
    events: Arc<dyn WebhookEventRepoTrait>,
    ledger: Arc<LedgerUseCases>,
    activator: Arc<SubscriptionActivator>,
    providers: Arc<PaymentProviderRegistry>,
    verify_timeout: Duration,
}

impl ReconcilerUseCases {
    pub fn new(
        events: Arc<dyn WebhookEventRepoTrait>,
        ledger: Arc<LedgerUseCases>,
        activator: Arc<SubscriptionActivator>,
        providers: Arc<PaymentProviderRegistry>,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            events,
            ledger,
            activator,
            providers,
            verify_timeout,
        }
    }

    /// Record and process one inbound callback.
    ///
    /// Only a failure to record the raw event is returned as an error. Once it
    /// is stored the provider gets an acknowledgement; events that could not be
    /// processed stay open for `replay_unprocessed`.
    pub async fn handle_webhook(
        &self,
        provider: PaymentProvider,
        payload: WebhookPayload,
        now: NaiveDateTime,
    ) -> AppResult<WebhookReceipt> {
        let event = self
            .events
            .record(provider, &payload.raw, payload.signature.as_deref())
            .await?;

        tracing::info!(
            event_id = %event.id,
            provider = %provider,
            payload_len = payload.raw.len(),
            "Webhook event recorded"
        );

        match self.process_event(&event, now).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Webhook bookkeeping failed");
                Ok(WebhookReceipt {
                    event_id: event.id,
                    outcome: None,
                    processed: false,
                })
            }
        }
    }

    /// Run a stored event through decode, lookup and settlement.
    pub async fn process_event(
        &self,
        event: &WebhookEventProfile,
        now: NaiveDateTime,
    ) -> AppResult<WebhookReceipt> {
        let mut details = EventDetails::default();

        match self.settle_event(event, now, &mut details).await {
            Ok(outcome) => {
                self.events
                    .mark_processed(event.id, outcome, &details)
                    .await?;
                tracing::info!(
                    event_id = %event.id,
                    provider = %event.provider,
                    provider_ref = ?details.provider_ref,
                    event_type = ?details.event_type,
                    outcome = %outcome,
                    "Webhook event processed"
                );
                Ok(WebhookReceipt {
                    event_id: event.id,
                    outcome: Some(outcome),
                    processed: true,
                })
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    provider = %event.provider,
                    provider_ref = ?details.provider_ref,
                    attempts = event.attempts + 1,
                    error = %e,
                    "Webhook processing failed, event left for replay"
                );
                self.events
                    .record_failed_attempt(event.id, &details, &e.to_string())
                    .await?;
                Ok(WebhookReceipt {
                    event_id: event.id,
                    outcome: None,
                    processed: false,
                })
            }
        }
    }

    async fn settle_event(
        &self,
        event: &WebhookEventProfile,
        now: NaiveDateTime,
        details: &mut EventDetails,
    ) -> AppResult<WebhookOutcome> {
        let adapter = match self.providers.get(event.provider) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "Webhook for disabled provider");
                return Ok(WebhookOutcome::Invalid);
            }
        };

        let payload = WebhookPayload {
            raw: event.payload_raw.clone(),
            signature: event.signature.clone(),
        };
        let decoded = match adapter.decode_webhook(&payload) {
            Ok(decoded) => decoded,
            Err(e @ (AppError::InvalidSignature(_) | AppError::InvalidInput(_))) => {
                tracing::warn!(event_id = %event.id, error = %e, "Webhook rejected");
                return Ok(WebhookOutcome::Invalid);
            }
            Err(e) => return Err(e),
        };

        details.event_type = Some(decoded.raw_event_type.clone());
        details.provider_ref = Some(decoded.provider_ref.0.clone());

        let Some(tx) = self
            .ledger
            .find_by_provider_ref(event.provider, decoded.provider_ref.as_str())
            .await?
        else {
            tracing::info!(
                event_id = %event.id,
                provider_ref = %decoded.provider_ref,
                "No transaction for webhook reference"
            );
            return Ok(WebhookOutcome::Unmatched);
        };

        self.apply_to_transaction(&tx, decoded.status, now).await
    }

    /// Apply one provider report to a ledger row.
    ///
    /// Transitions are conditional on the row still being pending. A lost race
    /// is resolved by re-reading the row and comparing it with the report.
    pub async fn apply_to_transaction(
        &self,
        tx: &PaymentTransactionProfile,
        reported: SettlementStatus,
        now: NaiveDateTime,
    ) -> AppResult<WebhookOutcome> {
        if !reported.is_final() {
            return Ok(WebhookOutcome::Ignored);
        }
        if tx.status.is_terminal() {
            return Ok(compare_terminal(tx, reported));
        }

        let result = match reported {
            SettlementStatus::Success => {
                let activation = self.activator.prepare(tx, now).await?;
                self.ledger.mark_completed(tx.id, &activation).await
            }
            SettlementStatus::Failed => self.ledger.mark_failed(tx.id).await,
            SettlementStatus::Pending => return Ok(WebhookOutcome::Ignored),
        };

        match result {
            Ok(TransitionOutcome::Applied) => Ok(WebhookOutcome::Applied),
            Ok(TransitionOutcome::AlreadyApplied) => Ok(WebhookOutcome::Replayed),
            Err(AppError::LedgerConflict(_)) => {
                let current = self.ledger.get(tx.id).await?;
                Ok(compare_terminal(&current, reported))
            }
            Err(e) => Err(e),
        }
    }

    /// Pull the settlement from the provider and run it through the same
    /// state machine as a webhook.
    pub async fn verify_transaction(&self, id: Uuid, now: NaiveDateTime) -> AppResult<VerifyResult> {
        let tx = self.ledger.get(id).await?;
        let provider_ref = tx.provider_ref.clone().ok_or_else(|| {
            AppError::InvalidInput("Transaction has no provider reference yet".into())
        })?;
        let adapter = self.providers.get(tx.provider)?;

        let status = tokio::time::timeout(
            self.verify_timeout,
            adapter.verify(&ProviderRef::new(provider_ref.clone())),
        )
        .await
        .unwrap_or(Err(AppError::ProviderTimeout))?;

        let outcome = self.apply_to_transaction(&tx, status, now).await?;
        let current = self.ledger.get(id).await?;

        tracing::info!(
            transaction_id = %id,
            provider = %tx.provider,
            provider_ref = %provider_ref,
            reported = %status,
            outcome = %outcome,
            "Transaction verified"
        );

        Ok(VerifyResult {
            transaction_id: id,
            status,
            transaction_status: current.status,
            outcome,
        })
    }

    /// Re-drive events that were recorded but never closed.
    pub async fn replay_unprocessed(
        &self,
        limit: i64,
        now: NaiveDateTime,
    ) -> AppResult<Vec<WebhookReceipt>> {
        let pending = self.events.list_unprocessed(limit).await?;
        let mut receipts = Vec::with_capacity(pending.len());
        for event in &pending {
            receipts.push(self.process_event(event, now).await?);
        }
        let closed = receipts.iter().filter(|r| r.processed).count();
        tracing::info!(
            scanned = pending.len(),
            closed,
            "Replayed unprocessed webhook events"
        );
        Ok(receipts)
    }

    pub async fn list_needing_review(&self, limit: i64) -> AppResult<Vec<WebhookEventProfile>> {
        self.events.list_needing_review(limit).await
    }
}

fn compare_terminal(tx: &PaymentTransactionProfile, reported: SettlementStatus) -> WebhookOutcome {
    if tx.status.agrees_with(reported) {
        return WebhookOutcome::Replayed;
    }
    tracing::warn!(
        target: "audit",
        transaction_id = %tx.id,
        provider = %tx.provider,
        provider_ref = ?tx.provider_ref,
        ledger_status = %tx.status,
        reported = %reported,
        "Provider report conflicts with settled transaction"
    );
    WebhookOutcome::Conflict
}
