use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::checkout::CheckoutRequest,
    domain::entities::{payment_provider::PaymentProvider, payment_scenario::PaymentScenario},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(begin_checkout))
}

#[derive(Deserialize)]
struct CheckoutPayload {
    subscriber_id: Uuid,
    plan_id: Uuid,
    provider: PaymentProvider,
    return_url_prefix: String,
    #[serde(default)]
    customer_email: Option<String>,
    /// Only the dummy provider honours this
    #[serde(default)]
    scenario: Option<PaymentScenario>,
}

/// POST /api/checkout
async fn begin_checkout(
    State(app_state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<impl IntoResponse> {
    let session = app_state
        .checkout_use_cases
        .begin_checkout(
            CheckoutRequest {
                subscriber_id: payload.subscriber_id,
                plan_id: payload.plan_id,
                provider: payload.provider,
                return_url_prefix: payload.return_url_prefix,
                customer_email: payload.customer_email,
                scenario: payload.scenario,
            },
            Utc::now().naive_utc(),
        )
        .await?;

    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        app_error::AppError,
        domain::entities::transaction_status::TransactionStatus,
        test_utils::{TestAppStateBuilder, create_test_plan},
    };

    use super::*;

    fn checkout_body(plan_id: Uuid, provider: &str) -> Value {
        json!({
            "subscriber_id": Uuid::new_v4(),
            "plan_id": plan_id,
            "provider": provider,
            "return_url_prefix": "https://market.example/billing",
        })
    }

    #[tokio::test]
    async fn checkout_creates_pending_transaction_with_provider_ref() {
        let plan = create_test_plan(|_| {});
        let (app_state, store, provider) =
            TestAppStateBuilder::new().with_plan(plan.clone()).build_with_mocks();
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let response = server.post("/").json(&checkout_body(plan.id, "stripe")).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        let tx_id: Uuid = body["transaction_id"].as_str().unwrap().parse().unwrap();
        assert_eq!(
            body["provider_ref"].as_str().unwrap(),
            format!("scripted_{}", tx_id)
        );
        assert!(body["checkout_url"].as_str().unwrap().starts_with("https://"));

        let tx = store.transaction(tx_id).unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount_cents, plan.price_cents);
        assert_eq!(provider.initiate_calls(), 1);
        assert_eq!(
            provider.last_request().unwrap().success_url,
            format!("https://market.example/billing/success?transaction_id={}", tx_id)
        );
    }

    #[tokio::test]
    async fn checkout_with_disabled_provider_is_bad_request() {
        let plan = create_test_plan(|_| {});
        let (app_state, store, _) =
            TestAppStateBuilder::new().with_plan(plan.clone()).build_with_mocks();
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let response = server
            .post("/")
            .json(&checkout_body(plan.id, "flutterwave"))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "PROVIDER_NOT_CONFIGURED");
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn provider_rejection_fails_the_transaction() {
        let plan = create_test_plan(|_| {});
        let (app_state, store, provider) =
            TestAppStateBuilder::new().with_plan(plan.clone()).build_with_mocks();
        provider.push_initiate_result(Err(AppError::ProviderRejected("card declined".into())));
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let response = server.post("/").json(&checkout_body(plan.id, "stripe")).await;

        assert_eq!(response.status_code(), StatusCode::PAYMENT_REQUIRED);
        let body: Value = response.json();
        assert_eq!(body["code"], "PROVIDER_REJECTED");

        let subscriber_id: Uuid = provider.last_request().unwrap().subscriber_id;
        let txs = store.transactions_for(subscriber_id);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn provider_outage_leaves_transaction_pending() {
        let plan = create_test_plan(|_| {});
        let (app_state, store, provider) =
            TestAppStateBuilder::new().with_plan(plan.clone()).build_with_mocks();
        provider.push_initiate_result(Err(AppError::ProviderUnavailable("502".into())));
        provider.push_initiate_result(Err(AppError::ProviderUnavailable("502".into())));
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let response = server.post("/").json(&checkout_body(plan.id, "stripe")).await;

        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["code"], "PROVIDER_UNAVAILABLE");
        assert_eq!(provider.initiate_calls(), 2);

        let subscriber_id = provider.last_request().unwrap().subscriber_id;
        let txs = store.transactions_for(subscriber_id);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn dummy_checkout_returns_local_redirect() {
        let plan = create_test_plan(|_| {});
        let app_state = TestAppStateBuilder::new().with_plan(plan.clone()).build();
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let mut body = checkout_body(plan.id, "dummy");
        body["scenario"] = json!("success");
        let response = server.post("/").json(&body).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert!(
            body["provider_ref"]
                .as_str()
                .unwrap()
                .starts_with("dummy_success_")
        );
        assert!(
            body["checkout_url"]
                .as_str()
                .unwrap()
                .starts_with("https://market.example/billing/success")
        );
    }

    #[tokio::test]
    async fn checkout_rejects_relative_return_url() {
        let plan = create_test_plan(|_| {});
        let app_state = TestAppStateBuilder::new().with_plan(plan.clone()).build();
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let mut body = checkout_body(plan.id, "stripe");
        body["return_url_prefix"] = json!("/billing");
        let response = server.post("/").json(&body).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_for_unknown_plan_is_not_found() {
        let app_state = TestAppStateBuilder::new().build();
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        let response = server
            .post("/")
            .json(&checkout_body(Uuid::new_v4(), "stripe"))
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
