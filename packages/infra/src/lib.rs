//! # Redigate インフラ層
//!
//! 共有 Redis 接続の遅延確立と、コマンドの転送を担当する。
//!
//! ## 構成
//!
//! ```text
//! CommandDispatcher ──(毎回取得)──▶ ConnectionRegistry ──(初回のみ)──▶ Connector
//!        │                                  │
//!        └──────────── send ──────────▶ ConnectionHandle ──▶ Transport
//! ```
//!
//! - [`registry`] - サービス名ごとに接続ハンドルを 1 つだけ保持するレジストリ
//! - [`dispatcher`] - コマンドを現在のハンドルへ転送する汎用の呼び出し口
//! - [`commands`] - コマンドごとの型付きラッパー（宣言マクロで生成）
//! - [`connection`] - ハンドルと `Connector` / `Transport` / `Subscriber` トレイト
//! - [`subscription`] - 専用接続での Pub/Sub 購読
//! - [`redis`] - `redis` クレートの `ConnectionManager` を使う本番実装
//! - [`error`] - インフラ層エラー定義
//! - `mock` - テスト用のインメモリ実装（`test-utils` feature）
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use redigate_infra::{CommandDispatcher, ConnectionRegistry, redis::RedisConnector};
//!
//! let registry = Arc::new(ConnectionRegistry::new(Arc::new(RedisConnector)));
//! let redis = CommandDispatcher::new(registry);
//!
//! redis.set("greeting", "hello").await?;
//! let value = redis.get("greeting").await?;
//! ```

pub mod commands;
pub mod connection;
pub mod dispatcher;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod redis;
pub mod registry;
pub mod subscription;

pub use ::redis::Value;
pub use connection::{ConnectionHandle, Connector, Subscriber, Transport};
pub use dispatcher::CommandDispatcher;
pub use error::{InfraError, InfraErrorKind};
pub use registry::ConnectionRegistry;
pub use subscription::{PubSubMessage, Subscription};
