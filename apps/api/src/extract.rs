//! # Redis クライアント抽出
//!
//! ハンドラの引数に [`RedisClient`] を書くと、処理に入る前に
//! 共有接続が用意される。接続済みならそのまま再利用し、
//! 未接続なら設定から確立する。
//!
//! ```rust,ignore
//! async fn handler(redis: RedisClient) -> Result<StatusCode, ApiError> {
//!     redis.set("greeting", "hello").await?;
//!     Ok(StatusCode::NO_CONTENT)
//! }
//! ```
//!
//! 接続に失敗した場合はハンドラを呼ばずに 503 を返す。

use axum::{extract::FromRequestParts, http::request::Parts};
use derive_more::Deref;
use redigate_infra::CommandDispatcher;

use crate::{error::ApiError, state::AppState};

/// デフォルトのサービスに接続済みのディスパッチャ
#[derive(Debug, Clone, Deref)]
pub struct RedisClient(CommandDispatcher);

impl RedisClient {
    pub fn into_inner(self) -> CommandDispatcher {
        self.0
    }
}

impl FromRequestParts<AppState> for RedisClient {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let dispatcher = state.dispatcher();
        state.registry().handle(dispatcher.service()).await?;
        Ok(Self(dispatcher))
    }
}
