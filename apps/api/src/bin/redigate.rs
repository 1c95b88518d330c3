//! # Redigate サーバー
//!
//! 共有 Redis 接続を使う HTTP サーバー。
//!
//! ## 環境変数
//!
//! | 変数名 | 説明 |
//! |--------|------|
//! | `REDIGATE_CONFIG` | 設定ファイルのパス（デフォルト: `config/redigate.toml`） |
//! | `REDIGATE__*` | 設定値の上書き（例: `REDIGATE__STORES__REDIS__HOST`） |
//! | `RUST_LOG` | ログレベル（デフォルト: `info,redigate=debug`） |
//! | `LOG_FORMAT` | `json` または `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! cargo run --bin redigate
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use redigate_api::{app::router, config::AppConfig, state::AppState};
use redigate_infra::redis::RedisConnector;
use redigate_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("redigate");
    let _root_span = init_tracing(&tracing_config)
        .context("トレーシングの初期化に失敗しました")?
        .entered();

    let config = AppConfig::load().context("設定の読み込みに失敗しました")?;
    let state = AppState::from_config(&config, Arc::new(RedisConnector));
    let registry = Arc::clone(state.registry());

    tracing::info!(
        stores = ?state.registry().configured_services(),
        "Redigate サーバーを起動します: {}",
        config.server.bind_address()
    );

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .context("アドレスのパースに失敗しました")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Redigate サーバーが起動しました: {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.clear();
    tracing::info!("Redigate サーバーを停止しました");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "シグナルの待機に失敗しました");
    }
    tracing::info!("シャットダウンを開始します");
}
