use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{adapters::http::app_state::AppState, app_error::AppError, infra::crypto};

/// Guard for `/api/admin`: `Authorization: Bearer <ADMIN_API_TOKEN>`.
///
/// Rejects every request when no admin token is configured.
pub async fn admin_auth(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = app_state.config.admin_api_token.as_ref() else {
        tracing::warn!("Admin request rejected: ADMIN_API_TOKEN is not configured");
        return Err(AppError::Unauthorized);
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AppError::Unauthorized)?;

    if !crypto::matches_secret(presented, expected) {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
