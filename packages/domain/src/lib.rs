//! # Redigate ドメイン層
//!
//! 共有 Redis 接続とコマンド転送のための純粋なモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは I/O を一切持たない。接続の確立やコマンドの送信は
//! `redigate_infra` が担当し、ここでは以下だけを提供する:
//!
//! - **サービス名**: 接続をキャッシュする論理名（[`service::ServiceName`]）
//! - **接続設定**: 設定マッピングとデフォルト値の解決（[`settings`]）
//! - **コマンド体系**: 転送可能なコマンドの列挙（[`command::Command`]）
//! - **コマンド引数**: 異種混在の位置引数とオプション（[`argument`]）
//!
//! ## 依存関係の方向
//!
//! ```text
//! api → infra → domain
//!   ↘            ↗
//!     shared
//! ```
//!
//! ## 使用例
//!
//! ```rust
//! use redigate_domain::{
//!     command::{Command, CommandInvocation},
//!     settings::RedisSettings,
//! };
//!
//! let settings = RedisSettings {
//!     port: Some(6380),
//!     ..Default::default()
//! };
//! let resolved = settings.resolve();
//! assert_eq!(resolved.host(), "localhost");
//! assert_eq!(resolved.port(), 6380);
//!
//! let invocation = CommandInvocation::new(Command::Set, ["greeting", "hello"]);
//! assert_eq!(invocation.args().len(), 2);
//! ```

pub mod argument;
pub mod command;
pub mod error;
pub mod service;
pub mod settings;

pub use error::DomainError;
