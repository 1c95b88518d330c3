//! # API エラーハンドリング
//!
//! HTTP API のエラー定義と、axum レスポンスへの変換を行う。
//!
//! ## 設計方針
//!
//! - **RFC 7807 準拠**: Problem Details for HTTP APIs 仕様に従う
//! - **thiserror + anyhow**: 型安全なエラー定義とエラーチェインの両立
//! - **IntoResponse 実装**: axum との統合による自動レスポンス変換
//!
//! ## インフラ層エラーの変換
//!
//! | InfraErrorKind | ApiError | HTTP Status |
//! |----------------|----------|-------------|
//! | `Connection` | `StoreUnavailable` | 503 |
//! | `Command` | `Upstream` | 502 |
//! | `StoreReported` | `StoreRejected` | 422 |
//! | `UnknownCommand` | `Validation` | 400 |
//! | `Unexpected` | `Internal` | 500 |
//!
//! 接続・転送エラーの詳細はログにのみ出力する。
//! ストアのエラー応答はクライアントの入力に起因するため `detail` に含める。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use redigate_infra::{InfraError, InfraErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API 層で発生するエラー
#[derive(Debug, Error)]
pub enum ApiError {
    /// リソースが見つからない（404 Not Found）
    #[error("リソースが見つかりません")]
    NotFound,

    /// バリデーションエラー（400 Bad Request）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// ストアに接続できない（503 Service Unavailable）
    #[error("ストアに接続できません")]
    StoreUnavailable(#[source] InfraError),

    /// ストアとの通信に失敗した（502 Bad Gateway）
    #[error("ストアとの通信に失敗しました")]
    Upstream(#[source] InfraError),

    /// ストアがコマンドを拒否した（422 Unprocessable Entity）
    #[error("ストアがコマンドを拒否しました: {0}")]
    StoreRejected(String),

    /// 内部サーバーエラー（500 Internal Server Error）
    ///
    /// 内部エラーの詳細はクライアントに返さない。
    #[error("内部サーバーエラー")]
    Internal(#[from] anyhow::Error),
}

impl From<InfraError> for ApiError {
    fn from(err: InfraError) -> Self {
        match err.kind() {
            InfraErrorKind::Connection { .. } => Self::StoreUnavailable(err),
            InfraErrorKind::Command { .. } => Self::Upstream(err),
            InfraErrorKind::StoreReported { message, .. } => Self::StoreRejected(message.clone()),
            InfraErrorKind::UnknownCommand(source) => Self::Validation(source.to_string()),
            InfraErrorKind::Unexpected(_) => Self::Internal(anyhow::Error::new(err)),
        }
    }
}

/// RFC 7807 準拠のエラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// エラーの種類を識別する URI
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail:     Option<String>,
}

impl ErrorResponse {
    fn new(status: StatusCode, title: &str, detail: Option<String>) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, detail) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "リソースが見つかりません", None),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "バリデーションエラー", Some(msg)),
            ApiError::StoreUnavailable(err) => {
                tracing::error!(error = %err, span_trace = %err.span_trace(), "ストアに接続できません");
                (StatusCode::SERVICE_UNAVAILABLE, "ストアに接続できません", None)
            }
            ApiError::Upstream(err) => {
                tracing::error!(error = %err, span_trace = %err.span_trace(), "ストアとの通信に失敗しました");
                (StatusCode::BAD_GATEWAY, "ストアとの通信に失敗しました", None)
            }
            ApiError::StoreRejected(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ストアがコマンドを拒否しました",
                Some(msg),
            ),
            ApiError::Internal(err) => {
                tracing::error!("内部エラー: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "内部サーバーエラー", None)
            }
        };

        (status, Json(ErrorResponse::new(status, title, detail))).into_response()
    }
}
