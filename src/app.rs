use std::net::SocketAddr;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::rate_limit::limit_by_ip;
use crate::state::AppState;
use crate::{auth, transactions};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router(state.clone()))
                .merge(transactions::router(state.clone()))
                .route("/health", get(|| async { "ok" })),
        )
        .layer(from_fn_with_state(state.clone(), limit_by_ip))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{dto::PublicUser, jwt::JwtKeys, repo::UserRepository};
    use crate::config::JwtConfig;
    use crate::storage::Repositories;
    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": "Password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_create_and_summarize() {
        let app = build_app(AppState::fake());
        let token = register(&app, "user@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(&token),
            Some(json!({
                "type": "EXPENSE",
                "amount": 25.50,
                "description": "Lunch",
                "date": "2024-01-15"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["amount"], 25.5);
        assert_eq!(body["data"]["date"], "2024-01-15");

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions/summary",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({
                "totalIncome": 0.0,
                "totalExpense": 25.5,
                "balance": -25.5,
                "transactionCount": 1
            })
        );

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions?limit=5",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["pagination"]["limit"], 5);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/v1/transactions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({ "success": false, "error": "Access token is required" })
        );

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/auth/me",
            Some("not-a-jwt"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn other_users_get_forbidden() {
        let app = build_app(AppState::fake());
        let owner = register(&app, "owner@example.com").await;
        let other = register(&app, "other@example.com").await;

        let (_, body) = call(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(&owner),
            Some(json!({ "type": "INCOME", "amount": 10, "date": "2024-01-15" })),
        )
        .await;
        let uri = format!("/api/v1/transactions/{}", body["data"]["id"]);

        let (status, body) = call(&app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Access denied");

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::GET, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Transaction not found");
    }

    #[tokio::test]
    async fn bad_ids_and_bodies_are_bad_requests() {
        let app = build_app(AppState::fake());
        let token = register(&app, "user@example.com").await;

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions/abc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Transaction ID must be a number");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/transactions")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn session_reports_optional_caller() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/v1/auth/session", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["authenticated"], false);

        let token = register(&app, "user@example.com").await;
        let (_, body) = call(
            &app,
            Method::GET,
            "/api/v1/auth/session",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["data"]["authenticated"], true);
        assert_eq!(body["data"]["user"]["email"], "user@example.com");
    }

    #[tokio::test]
    async fn session_ignores_bad_tokens() {
        let repos = Repositories::in_memory();
        let users = repos.users.clone();
        let app = build_app(AppState::from_parts(AppState::fake().config, repos));

        let foreign = JwtKeys::from_config(&JwtConfig {
            secret: "someone-else".into(),
            issuer: "test".into(),
            audience: "test".into(),
            expires_in: std::time::Duration::from_secs(300),
        })
        .generate_token(&PublicUser {
            id: 1,
            email: "user@example.com".into(),
            created_at: time::OffsetDateTime::now_utc(),
            updated_at: time::OffsetDateTime::now_utc(),
        })
        .unwrap();

        for token in ["garbage", "a.b.c", foreign.as_str()] {
            let (status, body) = call(
                &app,
                Method::GET,
                "/api/v1/auth/session",
                Some(token),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["authenticated"], false);
            assert_eq!(body["data"]["user"], Value::Null);
        }

        let token = register(&app, "gone@example.com").await;
        let (_, body) = call(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        let id = body["data"]["id"].as_i64().unwrap();
        assert!(users.delete(id).await.unwrap());

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/auth/session",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["authenticated"], false);

        let (status, body) = call(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = build_app(AppState::fake());
        register(&app, "user@example.com").await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "user@example.com", "password": "Password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["error"],
            "A user with this email address already exists"
        );
    }

    #[tokio::test]
    async fn rate_limit_rejects_excess_requests() {
        let mut config = (*AppState::fake().config).clone();
        config.rate_limit.max_requests = 1;
        let app = build_app(AppState::from_parts(
            Arc::new(config),
            Repositories::in_memory(),
        ));

        let peer = ConnectInfo(SocketAddr::from(([203, 0, 113, 7], 40000)));
        let mut statuses = Vec::new();
        for _ in 0..2 {
            let mut req = Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap();
            req.extensions_mut().insert(peer);
            let res = app.clone().oneshot(req).await.unwrap();
            statuses.push(res.status());
            if res.status() == StatusCode::TOO_MANY_REQUESTS {
                assert!(res.headers().contains_key(header::RETRY_AFTER));
            }
        }
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    }
}
