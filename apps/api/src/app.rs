//! # ルーター構築
//!
//! `main` はサーバー起動に集中し、ルーティングはここで組み立てる。
//! 統合テストも同じルーターを使う。

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handler::{delete_value, get_value, health_check, increment_value, put_value, readiness_check},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route(
            "/api/v1/kv/{key}",
            get(get_value).put(put_value).delete(delete_value),
        )
        .route("/api/v1/kv/{key}/incr", post(increment_value))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
