//! HTTP API 統合テスト
//!
//! インメモリのトランスポートでルーター全体を検証する。Redis は不要。
//!
//! 実行方法:
//! ```bash
//! cargo test -p redigate-api --test api_test
//! ```

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
    response::Response,
};
use pretty_assertions::assert_eq;
use redigate_api::{app::router, config::AppConfig, error::ErrorResponse, state::AppState};
use redigate_domain::command::Command;
use redigate_infra::mock::MockConnector;
use serde_json::{Value as Json, json};
use tower::ServiceExt;

fn setup_with(config: &AppConfig) -> (Arc<MockConnector>, Router) {
    let connector = Arc::new(MockConnector::new());
    let state = AppState::from_config(config, connector.clone());
    (connector, router(state))
}

fn setup() -> (Arc<MockConnector>, Router) {
    setup_with(&AppConfig::default())
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
    app.clone()
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Json {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_healthは常に200を返す() {
    let (connector, app) = setup();

    let response = send(&app, Method::GET, "/health", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_readyは全ストアの応答で200を返す() {
    let config = AppConfig::from_toml("[stores.redis]\ndb = 0\n[stores.cache]\nport = 6380\n").unwrap();
    let (connector, app) = setup_with(&config);

    let response = send(&app, Method::GET, "/health/ready", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "status": "ready",
            "stores": { "cache": "ok", "redis": "ok" }
        })
    );
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn test_readyは接続できないストアがあれば503を返す() {
    let (connector, app) = setup();
    connector.set_failing(true);

    let response = send(&app, Method::GET, "/health/ready", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await,
        json!({
            "status": "not_ready",
            "stores": { "redis": "error" }
        })
    );
}

#[tokio::test]
async fn test_putした値をgetで取得できる() {
    let (_, app) = setup();

    let put = send(&app, Method::PUT, "/api/v1/kv/greeting", Body::from("hello")).await;
    let get = send(&app, Method::GET, "/api/v1/kv/greeting", Body::empty()).await;

    assert_eq!(put.status(), StatusCode::NO_CONTENT);
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(body_bytes(get).await, b"hello".to_vec());
}

#[tokio::test]
async fn test_存在しないキーは404を返す() {
    let (_, app) = setup();

    let response = send(&app, Method::GET, "/api/v1/kv/missing", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(body.status, 404);
    assert_eq!(body.error_type, "about:blank");
}

#[tokio::test]
async fn test_deleteしたキーは取得できない() {
    let (_, app) = setup();
    send(&app, Method::PUT, "/api/v1/kv/k", Body::from("v")).await;

    let delete = send(&app, Method::DELETE, "/api/v1/kv/k", Body::empty()).await;
    let get = send(&app, Method::GET, "/api/v1/kv/k", Body::empty()).await;

    assert_eq!(delete.status(), StatusCode::NO_CONTENT);
    assert_eq!(get.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_incrは加算後の値を返す() {
    let (_, app) = setup();

    send(&app, Method::POST, "/api/v1/kv/counter/incr", Body::empty()).await;
    let response = send(&app, Method::POST, "/api/v1/kv/counter/incr", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "key": "counter", "value": 2 }));
}

#[tokio::test]
async fn test_数値でない値のincrは422を返す() {
    let (_, app) = setup();
    send(&app, Method::PUT, "/api/v1/kv/name", Body::from("alice")).await;

    let response = send(&app, Method::POST, "/api/v1/kv/name/incr", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "ERR value is not an integer or out of range");
}

#[tokio::test]
async fn test_接続できなければ503を返す() {
    let (connector, app) = setup();
    connector.set_failing(true);

    let response = send(&app, Method::GET, "/api/v1/kv/k", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_切断された接続は502を返す() {
    let (connector, app) = setup();
    send(&app, Method::PUT, "/api/v1/kv/k", Body::from("v")).await;
    connector.last_transport().unwrap().sever();

    let response = send(&app, Method::GET, "/api/v1/kv/k", Body::empty()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_リクエストをまたいで同じ接続を再利用する() {
    let (connector, app) = setup();

    for _ in 0..3 {
        send(&app, Method::PUT, "/api/v1/kv/k", Body::from("v")).await;
    }

    assert_eq!(connector.connect_count(), 1);
    let transport = connector.last_transport().unwrap();
    assert_eq!(transport.observed_commands(), vec![Command::Set; 3]);
}
