//! # ヘルスチェック共通型
//!
//! `/health`（Liveness）と `/health/ready`（Readiness）のレスポンス型。
//!
//! Readiness はストアごとのチェック結果を集約する。キーはサービス名で、
//! JSON 出力の順序を安定させるため [`BTreeMap`] で保持する。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Liveness Check のレスポンス
///
/// ```
/// use redigate_shared::HealthResponse;
///
/// let response = HealthResponse::healthy("0.1.0");
/// assert_eq!(response.status, "healthy");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 稼働状態（常に `"healthy"`）
    pub status:  String,
    /// アプリケーションバージョン
    pub version: String,
}

impl HealthResponse {
    pub fn healthy(version: impl Into<String>) -> Self {
        Self {
            status:  "healthy".to_string(),
            version: version.into(),
        }
    }
}

/// 個別チェックの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// Readiness 全体のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// 全ストアが応答した
    Ready,
    /// 1 つ以上のストアが応答しなかった
    NotReady,
}

/// Readiness Check のレスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: ReadinessStatus,
    /// サービス名ごとのチェック結果
    pub stores: BTreeMap<String, CheckStatus>,
}

impl ReadinessResponse {
    /// 個別結果から全体のステータスを導出する
    ///
    /// すべて [`CheckStatus::Ok`] の場合のみ [`ReadinessStatus::Ready`] になる。
    /// チェック対象が 0 件の場合も Ready とする。
    pub fn from_checks(stores: BTreeMap<String, CheckStatus>) -> Self {
        let status = if stores.values().all(|s| *s == CheckStatus::Ok) {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };
        Self { status, stores }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }
}
