use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/usage", get(get_usage))
        .route("/{id}/subscriptions", get(list_subscriptions))
        .route("/{id}/posts", post(create_post))
        .route("/{id}/views", post(record_view))
}

#[derive(Deserialize)]
struct ListingPayload {
    category: String,
    listing_id: Uuid,
}

/// GET /api/subscribers/{id}/usage
async fn get_usage(
    State(app_state): State<AppState>,
    Path(subscriber_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let usage = app_state
        .usage_meter_use_cases
        .get_usage(subscriber_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(usage))
}

/// GET /api/subscribers/{id}/subscriptions
async fn list_subscriptions(
    State(app_state): State<AppState>,
    Path(subscriber_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let subs = app_state
        .subscription_use_cases
        .list_for_subscriber(subscriber_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(subs))
}

/// POST /api/subscribers/{id}/posts
async fn create_post(
    State(app_state): State<AppState>,
    Path(subscriber_id): Path<Uuid>,
    Json(payload): Json<ListingPayload>,
) -> AppResult<impl IntoResponse> {
    let quota = app_state
        .usage_meter_use_cases
        .create_post(
            subscriber_id,
            &payload.category,
            payload.listing_id,
            Utc::now().naive_utc(),
        )
        .await?;
    Ok(Json(quota))
}

/// POST /api/subscribers/{id}/views
async fn record_view(
    State(app_state): State<AppState>,
    Path(subscriber_id): Path<Uuid>,
    Json(payload): Json<ListingPayload>,
) -> AppResult<impl IntoResponse> {
    let quota = app_state
        .usage_meter_use_cases
        .record_view(
            subscriber_id,
            &payload.category,
            payload.listing_id,
            Utc::now().naive_utc(),
        )
        .await?;
    Ok(Json(quota))
}
