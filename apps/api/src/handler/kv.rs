//! # キー・バリューハンドラ
//!
//! デフォルトのサービスに対する単純なキー操作を HTTP で公開する。
//!
//! | メソッド | パス | コマンド | 成功時 |
//! |----------|------|----------|--------|
//! | `GET` | `/api/v1/kv/{key}` | `GET` | 200（値をそのまま返す）/ 404 |
//! | `PUT` | `/api/v1/kv/{key}` | `SET` | 204 |
//! | `DELETE` | `/api/v1/kv/{key}` | `DEL` | 204 |
//! | `POST` | `/api/v1/kv/{key}/incr` | `INCR` | 200（JSON） |

use axum::{
    Json,
    body::Bytes,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use redigate_infra::Value;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extract::RedisClient};

/// `INCR` の結果
#[derive(Debug, Serialize, Deserialize)]
pub struct IncrementResponse {
    pub key:   String,
    pub value: i64,
}

fn unexpected_reply(command: &str, value: &Value) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("{command} に想定外の応答: {value:?}"))
}

#[tracing::instrument(skip_all, level = "debug", fields(%key))]
pub async fn get_value(redis: RedisClient, Path(key): Path<String>) -> Result<Response, ApiError> {
    match redis.get(&key).await? {
        Value::BulkString(bytes) => {
            Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
        }
        Value::Nil => Err(ApiError::NotFound),
        other => Err(unexpected_reply("GET", &other)),
    }
}

#[tracing::instrument(skip_all, level = "debug", fields(%key))]
pub async fn put_value(
    redis: RedisClient,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    redis.set(&key, body.to_vec()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all, level = "debug", fields(%key))]
pub async fn delete_value(redis: RedisClient, Path(key): Path<String>) -> Result<StatusCode, ApiError> {
    redis.del([&key]).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all, level = "debug", fields(%key))]
pub async fn increment_value(
    redis: RedisClient,
    Path(key): Path<String>,
) -> Result<Json<IncrementResponse>, ApiError> {
    match redis.incr(&key).await? {
        Value::Int(value) => Ok(Json(IncrementResponse { key, value })),
        other => Err(unexpected_reply("INCR", &other)),
    }
}
