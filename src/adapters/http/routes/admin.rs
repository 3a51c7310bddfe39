use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::{
        ledger::TransitionOutcome,
        plans::{CreatePlanInput, UpdatePlanInput},
        reconciler::WebhookReceipt,
    },
};

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 500;

/// Operator endpoints. `admin_auth` is layered on in `routes::router`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/{id}", patch(update_plan))
        .route("/transactions/{id}/refund", post(refund_transaction))
        .route("/subscriptions/{id}/cancel", post(cancel_subscription))
        .route("/subscriptions/expire", post(expire_subscriptions))
        .route("/webhook-events/review", get(list_review_events))
        .route("/webhook-events/replay", post(replay_events))
        .route("/ledger/summary", get(ledger_summary))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<i64>,
}

impl PageQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }
}

#[derive(Serialize)]
struct RefundResponse {
    transaction_id: Uuid,
    /// False when the transaction was already refunded
    changed: bool,
}

#[derive(Serialize)]
struct ExpireResponse {
    expired: u64,
}

#[derive(Serialize)]
struct ReplayResponse {
    scanned: usize,
    processed: usize,
    receipts: Vec<WebhookReceipt>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/plans
/// All plans, retired ones included.
async fn list_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_plans().await?;
    Ok(Json(plans))
}

/// POST /api/admin/plans
async fn create_plan(
    State(app_state): State<AppState>,
    Json(payload): Json<CreatePlanInput>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.create_plan(payload).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// PATCH /api/admin/plans/{id}
async fn update_plan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanInput>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.update_plan(id, payload).await?;
    Ok(Json(plan))
}

/// POST /api/admin/transactions/{id}/refund
/// Records a refund issued in the provider dashboard. Only completed
/// transactions can be refunded.
async fn refund_transaction(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let outcome = app_state.ledger_use_cases.mark_refunded(id).await?;
    Ok(Json(RefundResponse {
        transaction_id: id,
        changed: outcome == TransitionOutcome::Applied,
    }))
}

/// POST /api/admin/subscriptions/{id}/cancel
async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sub = app_state
        .subscription_use_cases
        .cancel_subscription(id, Utc::now().naive_utc())
        .await?;
    Ok(Json(sub))
}

/// POST /api/admin/subscriptions/expire
/// Persists expiry for subscriptions past their end date. Reads already treat
/// them as expired; this only tidies the stored status.
async fn expire_subscriptions(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let expired = app_state
        .subscription_use_cases
        .expire_lapsed(Utc::now().naive_utc())
        .await?;
    Ok(Json(ExpireResponse { expired }))
}

/// GET /api/admin/webhook-events/review?limit=
async fn list_review_events(
    State(app_state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let events = app_state
        .reconciler_use_cases
        .list_needing_review(page.limit())
        .await?;
    Ok(Json(events))
}

/// POST /api/admin/webhook-events/replay?limit=
async fn replay_events(
    State(app_state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let receipts = app_state
        .reconciler_use_cases
        .replay_unprocessed(page.limit(), Utc::now().naive_utc())
        .await?;
    Ok(Json(ReplayResponse {
        scanned: receipts.len(),
        processed: receipts.iter().filter(|r| r.processed).count(),
        receipts,
    }))
}

/// GET /api/admin/ledger/summary
async fn ledger_summary(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let summary = app_state.ledger_use_cases.summary().await?;
    Ok(Json(summary))
}
