use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/verify", post(verify_transaction))
}

/// POST /api/transactions/{id}/verify
/// Pulls the settlement from the provider, for return pages that land before
/// the webhook does.
async fn verify_transaction(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .reconciler_use_cases
        .verify_transaction(id, Utc::now().naive_utc())
        .await?;
    Ok(Json(result))
}
