pub mod admin;
pub mod checkout;
pub mod plans;
pub mod subscribers;
pub mod transactions;
pub mod webhooks;

use axum::{Router, middleware};

use crate::adapters::http::{app_state::AppState, middleware::admin_auth};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/checkout", checkout::router())
        .nest("/webhooks", webhooks::router())
        .nest("/transactions", transactions::router())
        .nest("/subscribers", subscribers::router())
        .nest("/plans", plans::router())
        .nest(
            "/admin",
            admin::router().layer(middleware::from_fn_with_state(app_state, admin_auth)),
        )
}
