//! # Redigate API サーバー
//!
//! 共有 Redis 接続を axum アプリケーションに組み込む。
//!
//! ## 構成
//!
//! ```text
//! Request ──▶ RedisClient 抽出 ──▶ handler ──▶ CommandDispatcher ──▶ Redis
//!                  │
//!                  └── AppState.registry（初回のみ接続を確立）
//! ```
//!
//! ## モジュール構成
//!
//! - [`config`] - 設定ファイル・環境変数の読み込み
//! - [`state`] - リクエスト間で共有するアプリケーション状態
//! - [`extract`] - ハンドラに接続済みのクライアントを渡す抽出器
//! - [`handler`] - HTTP リクエストハンドラ
//! - [`error`] - API エラー定義と HTTP レスポンスへの変換
//! - [`app`] - ルーター構築

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod state;
