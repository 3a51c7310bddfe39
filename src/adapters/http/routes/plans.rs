use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_active_plans))
}

/// GET /api/plans
async fn list_active_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_active_plans().await?;
    Ok(Json(plans))
}
