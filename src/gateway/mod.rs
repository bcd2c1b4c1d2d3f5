//! HTTP Gateway
//!
//! - `/api/v1/auth/*`: public login
//! - `/api/v1/transfers`, `/api/v1/withdrawals`, `/api/v1/contacts`: bearer JWT
//! - `/api/v1/settlement/*`: settlement worker token
//! - `/docs`: Swagger UI

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the complete router
pub fn build_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Auth Routes (public)
    // ==========================================================================
    let auth_routes =
        Router::new().route("/telegram", post(crate::user_auth::handlers::telegram_login));

    // ==========================================================================
    // User Routes - Protected by JWT
    // ==========================================================================
    let user_routes = Router::new()
        .route(
            "/api/v1/transfers",
            post(handlers::create_transfer).get(handlers::list_transfers),
        )
        .route("/api/v1/transfers/{id}", get(handlers::get_transfer))
        .route(
            "/api/v1/transfers/{id}/cancel",
            post(handlers::cancel_transfer),
        )
        .route(
            "/api/v1/withdrawals",
            post(handlers::create_withdrawal).get(handlers::list_withdrawals),
        )
        .route("/api/v1/withdrawals/{id}", get(handlers::get_withdrawal))
        .route(
            "/api/v1/contacts",
            get(handlers::list_contacts).post(handlers::add_contact),
        )
        .layer(from_fn_with_state(
            state.clone(),
            crate::user_auth::middleware::jwt_auth_middleware,
        ));

    // ==========================================================================
    // Settlement Routes - Protected by the worker token
    // ==========================================================================
    let settlement_routes = Router::new()
        .route("/pending", get(handlers::pending_settlements))
        .route("/{id}/completed", post(handlers::settlement_completed))
        .route("/{id}/failed", post(handlers::settlement_failed))
        .route(
            "/withdrawals/pending",
            get(handlers::pending_withdrawals),
        )
        .route(
            "/withdrawals/{id}/status",
            post(handlers::report_withdrawal_status),
        )
        .layer(from_fn_with_state(
            state.clone(),
            handlers::settlement_auth_middleware,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/settlement", settlement_routes)
        .merge(user_routes)
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Start HTTP Gateway server
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeeSchedule;
    use crate::identity::{MemoryUserDirectory, UserDirectory};
    use crate::transfer::{
        Clock, ManualClock, MemoryTransferStore, TransferLedger, TransferLimits, TransferService,
    };
    use crate::user_auth::{AuthSettings, UserAuthService, sign_init_data};
    use crate::withdrawal::{MemoryWithdrawalStore, WithdrawalPolicy, WithdrawalService};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BOT_TOKEN: &str = "42:GATEWAY-TEST";
    const SETTLEMENT_TOKEN: &str = "worker-secret";

    struct TestApp {
        router: Router,
        clock: Arc<ManualClock>,
    }

    impl TestApp {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
            let ledger = Arc::new(TransferLedger::new(
                Arc::new(MemoryTransferStore::new()),
                clock.clone(),
                FeeSchedule::default(),
                TransferLimits::default(),
            ));
            let transfers = Arc::new(TransferService::new(ledger, users.clone()));
            let user_auth = Arc::new(UserAuthService::new(
                AuthSettings {
                    jwt_secret: "gateway-test-secret".to_string(),
                    token_ttl: Duration::hours(1),
                    telegram_bot_token: Some(BOT_TOKEN.to_string()),
                    init_data_max_age: Duration::hours(24),
                },
                users.clone(),
                transfers.clone(),
                clock.clone(),
            ));
            let withdrawals = Arc::new(WithdrawalService::new(
                Arc::new(MemoryWithdrawalStore::new()),
                clock.clone(),
                WithdrawalPolicy::default(),
            ));
            let state = AppState::new(transfers, users, user_auth, withdrawals)
                .with_settlement_token(Some(SETTLEMENT_TOKEN.to_string()));

            Self {
                router: build_router(Arc::new(state)),
                clock,
            }
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let body = body.map(|b| ("application/json", b.to_string()));
            self.send(method, uri, token, body).await
        }

        /// Send `body` verbatim with the given content type
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<(&str, String)>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some((content_type, body)) => builder
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }

        async fn login(&self, telegram_id: i64, username: &str) -> String {
            let user = json!({"id": telegram_id, "first_name": username, "username": username})
                .to_string();
            let auth_date = self.clock.now().timestamp().to_string();
            let init_data =
                sign_init_data(BOT_TOKEN, &[("user", user.as_str()), ("auth_date", auth_date.as_str())]).unwrap();

            let (status, body) = self
                .call(
                    Method::POST,
                    "/api/v1/auth/telegram",
                    None,
                    Some(json!({ "initData": init_data })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            body["token"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_transfers_require_bearer_token() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/v1/transfers", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "MISSING_AUTH");

        let (status, _) = app
            .call(Method::GET, "/api/v1/transfers", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_and_cancel_test_transfer() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(json!({
                    "recipientHandle": "@bob",
                    "amount": "3.00",
                    "currency": "USDC",
                    "isTest": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["success"], true);
        assert_eq!(body["transfer"]["feeAmount"], "0.015");
        assert_eq!(body["transfer"]["status"], "pending");
        assert_eq!(body["transfer"]["recipientHandle"], "bob");
        let id = body["transfer"]["transferId"].as_str().unwrap().to_string();

        app.clock.advance(Duration::seconds(60));
        let uri = format!("/api/v1/transfers/{}/cancel", id);
        let (status, body) = app.call(Method::POST, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["transfer"]["status"], "cancelled");

        let (status, body) = app.call(Method::POST, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body,
            json!({"success": false, "code": "CONFLICT", "error": "already finalized"})
        );
    }

    #[tokio::test]
    async fn test_cancel_after_window_is_conflict() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;
        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(json!({"recipientHandle": "bob", "amount": "2", "currency": "USDC", "isTest": true})),
            )
            .await;
        let id = body["transfer"]["transferId"].as_str().unwrap().to_string();

        app.clock.advance(Duration::minutes(6));
        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/v1/transfers/{}/cancel", id),
                Some(&alice),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "window expired");
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_and_numeric_amount() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(json!({"recipientHandle": "bob", "amount": "10000.01", "currency": "USDC"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "AMOUNT_OUT_OF_RANGE");

        for amount in [json!(5), json!("5."), json!(".5"), json!("1e3")] {
            let (status, body) = app
                .call(
                    Method::POST,
                    "/api/v1/transfers",
                    Some(&alice),
                    Some(json!({"recipientHandle": "bob", "amount": amount, "currency": "USDC"})),
                )
                .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", amount);
            assert_eq!(body["success"], false, "{}", amount);
            assert_eq!(body["code"], "INVALID_PARAMETER", "{}", amount);
        }

        let (_, body) = app
            .call(Method::GET, "/api/v1/transfers", Some(&alice), None)
            .await;
        assert_eq!(body["transfers"], json!([]));
    }

    #[tokio::test]
    async fn test_malformed_requests_get_error_body() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(("text/plain", "send 5 to bob".to_string())),
            )
            .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_PARAMETER");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(("application/json", "{not json".to_string())),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");

        let (status, body) = app
            .call(Method::GET, "/api/v1/transfers?limit=abc", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_PARAMETER");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/telegram",
                None,
                Some(("application/json", "[]".to_string())),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INVALID_PARAMETER");

        let (status, body) = app
            .send(
                Method::GET,
                "/api/v1/settlement/pending?limit=-1",
                Some(SETTLEMENT_TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_list_accepts_any_spelling_of_own_user_id() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;
        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(json!({"recipientHandle": "bob", "amount": "4", "currency": "USDC"})),
            )
            .await;
        let own_id = body["transfer"]["senderId"].as_str().unwrap().to_string();

        for spelling in [
            own_id.clone(),
            own_id.to_uppercase(),
            format!("%7B{}%7D", own_id),
        ] {
            let uri = format!("/api/v1/transfers?userId={}", spelling);
            let (status, body) = app.call(Method::GET, &uri, Some(&alice), None).await;
            assert_eq!(status, StatusCode::OK, "{}: {}", spelling, body);
            assert_eq!(body["transfers"].as_array().unwrap().len(), 1);
        }

        let (status, body) = app
            .call(Method::GET, "/api/v1/transfers?userId=garbage", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_withdrawal_flow() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;
        let eve = app.login(2, "eve").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/withdrawals",
                Some(&alice),
                Some(json!({"amount": "100", "currency": "usdc", "bankAccountId": "acct-42"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["withdrawal"]["status"], "pending");
        assert_eq!(body["withdrawal"]["feeAmount"], "1");
        assert_eq!(body["withdrawal"]["fiatAmount"], "99");
        assert_eq!(body["withdrawal"]["fiatCurrency"], "USD");
        assert!(body["withdrawal"].get("bankAccountId").is_none());
        let id = body["withdrawal"]["withdrawalId"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/withdrawals/{}", id);

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/withdrawals",
                Some(&alice),
                Some(json!({"amount": "100", "currency": "USDC", "bankAccountId": " "})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_BANK_ACCOUNT");

        let (status, _) = app
            .call(Method::POST, "/api/v1/withdrawals", None, Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.call(Method::GET, &uri, Some(&eve), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, body) = app.call(Method::GET, "/api/v1/withdrawals", Some(&eve), None).await;
        assert_eq!(body["withdrawals"], json!([]));

        // Payout processor
        let (status, body) = app
            .call(
                Method::GET,
                "/api/v1/settlement/withdrawals/pending",
                Some(SETTLEMENT_TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["withdrawals"].as_array().unwrap().len(), 1);

        let status_uri = format!("/api/v1/settlement/withdrawals/{}/status", id);
        let (status, _) = app
            .call(
                Method::POST,
                &status_uri,
                Some(&alice),
                Some(json!({"status": "completed"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .call(
                Method::POST,
                &status_uri,
                Some(SETTLEMENT_TOKEN),
                Some(json!({"status": "completed"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "not processing");

        for next in ["processing", "completed"] {
            let (status, body) = app
                .call(
                    Method::POST,
                    &status_uri,
                    Some(SETTLEMENT_TOKEN),
                    Some(json!({"status": next})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            assert_eq!(body["withdrawal"]["status"], next);
        }

        let (status, body) = app
            .call(
                Method::POST,
                &status_uri,
                Some(SETTLEMENT_TOKEN),
                Some(json!({"status": "failed", "reason": "late"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already finalized");

        let (status, body) = app.call(Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["withdrawal"]["status"], "completed");
    }

    #[tokio::test]
    async fn test_recipient_sees_transfer_and_others_do_not() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;
        let bob = app.login(2, "bob").await;
        let eve = app.login(3, "eve").await;

        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(json!({"recipientHandle": "bob", "amount": "25", "currency": "ETH"})),
            )
            .await;
        let id = body["transfer"]["transferId"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/transfers/{}", id);

        let (status, body) = app.call(Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["amount"], "25");

        let (status, _) = app.call(Method::GET, &uri, Some(&eve), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Only the sender may cancel
        let (status, _) = app
            .call(Method::POST, &format!("{}/cancel", uri), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call(
                Method::GET,
                "/api/v1/transfers?userId=00000000-0000-0000-0000-000000000000",
                Some(&bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/v1/transfers/{}/cancel", uuid::Uuid::new_v4()),
                Some(&alice),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TRANSFER_NOT_FOUND");

        let (status, _) = app
            .call(Method::GET, "/api/v1/transfers/not-a-uuid", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_settlement_flow() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;
        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/transfers",
                Some(&alice),
                Some(json!({"recipientHandle": "bob", "amount": "100", "currency": "DAI"})),
            )
            .await;
        let id = body["transfer"]["transferId"].as_str().unwrap().to_string();

        // User tokens do not open settlement routes
        let (status, _) = app
            .call(Method::GET, "/api/v1/settlement/pending", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .call(
                Method::GET,
                "/api/v1/settlement/pending",
                Some(SETTLEMENT_TOKEN),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfers"].as_array().unwrap().len(), 1);

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/v1/settlement/{}/completed", id),
                Some(SETTLEMENT_TOKEN),
                Some(json!({"transactionRef": "0xabc123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["transfer"]["status"], "completed");
        assert_eq!(body["transfer"]["transactionRef"], "0xabc123");

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/v1/settlement/{}/failed", id),
                Some(SETTLEMENT_TOKEN),
                Some(json!({"reason": "timeout"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already finalized");
    }

    #[tokio::test]
    async fn test_contacts_roundtrip() {
        let app = TestApp::new();
        let alice = app.login(1, "alice").await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/contacts",
                Some(&alice),
                Some(json!({"contactTelegramId": "2"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contacts"][0]["contactTelegramId"], "2");

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/contacts",
                Some(&alice),
                Some(json!({"contactTelegramId": "1"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = app.call(Method::GET, "/api/v1/contacts", Some(&alice), None).await;
        assert_eq!(body["contacts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_signature() {
        let app = TestApp::new();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/auth/telegram",
                None,
                Some(json!({"initData": "user=%7B%22id%22%3A1%7D&auth_date=1&hash=00"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_FAILED");
    }
}
