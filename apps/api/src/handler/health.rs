//! # ヘルスチェックハンドラ
//!
//! - `/health` — Liveness Check（常に `"healthy"` を返す）
//! - `/health/ready` — Readiness Check（設定済みの全ストアに PING を送る）
//!
//! レスポンス型は [`redigate_shared::HealthResponse`] / [`redigate_shared::ReadinessResponse`] を参照。

use std::{collections::BTreeMap, time::Duration};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use redigate_infra::CommandDispatcher;
use redigate_shared::{CheckStatus, HealthResponse, ReadinessResponse};

use crate::state::AppState;

/// ストアごとの PING のタイムアウト
pub const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(env!("CARGO_PKG_VERSION")))
}

/// Readiness Check エンドポイント
///
/// 全ストア OK → 200、1 つでも失敗 → 503。
/// 未接続のストアはこの時点で接続を確立する。
#[tracing::instrument(skip_all)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut stores = BTreeMap::new();
    for service in state.registry().configured_services() {
        let status = check_store(state.dispatcher_for(service.clone())).await;
        stores.insert(service.to_string(), status);
    }

    let response = ReadinessResponse::from_checks(stores);
    let http_status = if response.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (http_status, Json(response))
}

/// ストアへの接続を PING で確認する
async fn check_store(redis: CommandDispatcher) -> CheckStatus {
    match tokio::time::timeout(READINESS_TIMEOUT, redis.ping()).await {
        Ok(Ok(_)) => CheckStatus::Ok,
        Ok(Err(e)) => {
            tracing::warn!(service = %redis.service(), error = %e, "readiness check: ping failed");
            CheckStatus::Error
        }
        Err(_) => {
            tracing::warn!(service = %redis.service(), "readiness check: ping timed out");
            CheckStatus::Error
        }
    }
}
