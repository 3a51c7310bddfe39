use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::ports::payment_provider::WebhookPayload,
    domain::entities::{payment_provider::PaymentProvider, webhook_outcome::WebhookOutcome},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{provider}", post(receive_webhook))
}

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
    event_id: Uuid,
    /// `None` when processing failed and the event waits for replay
    outcome: Option<WebhookOutcome>,
}

/// POST /api/webhooks/{provider}
///
/// The body is kept byte-for-byte for signature checks. Any delivery that
/// could be recorded is acknowledged with 200 so the provider stops retrying.
async fn receive_webhook(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let provider: PaymentProvider = provider
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Unknown payment provider: {}", provider)))?;

    let signature = headers
        .get(provider.signature_header())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let receipt = app_state
        .reconciler_use_cases
        .handle_webhook(
            provider,
            WebhookPayload {
                raw: body,
                signature,
            },
            Utc::now().naive_utc(),
        )
        .await?;

    Ok(Json(WebhookAck {
        received: true,
        event_id: receipt.event_id,
        outcome: receipt.outcome,
    }))
}
