//! # Redigate 共有ユーティリティ
//!
//! ドメインを持たない横断的な部品を提供する。
//!
//! - [`observability`] - トレーシング初期化とログ出力形式
//! - [`health`] - ヘルスチェック / Readiness Check のレスポンス型
//!
//! トレーシング初期化は `observability` feature を有効にした場合のみ利用できる。
//! ライブラリ利用側（infra など）が subscriber 実装に依存しないようにするため。

pub mod health;
pub mod observability;

pub use health::{CheckStatus, HealthResponse, ReadinessResponse, ReadinessStatus};
