//! # Redis 接続管理
//!
//! `redis` クレートを使った [`Connector`] / [`Transport`] の本番実装。
//!
//! ## ConnectionManager vs Connection
//!
//! | 方式 | 特徴 | 用途 |
//! |------|------|------|
//! | `Connection` | 単一接続、手動管理 | 短期間の処理 |
//! | `ConnectionManager` | 自動再接続、スレッドセーフ | 長期稼働アプリ |
//!
//! 共有接続は `ConnectionManager` で保持する。マネージャは Clone が安価なので、
//! 送信のたびにクローンして `&mut` を得る。
//!
//! ## エラーの振り分け
//!
//! 接続確立時の失敗はすべて [`InfraErrorKind::Connection`](crate::InfraErrorKind::Connection)。
//! 送信時の失敗は [`InfraError::from_redis`] で転送エラーとストア応答エラーに分ける。
//!
//! 購読は `ConnectionManager` を使わず、`Client::get_async_pubsub` で専用の接続を作る。

use std::sync::Arc;

use async_trait::async_trait;
use redigate_domain::{command::CommandInvocation, service::ServiceName, settings::ConnectionSettings};
use futures::StreamExt as _;
use redis::{
    Client,
    Cmd,
    Value,
    aio::{ConnectionManager, PubSub},
};

use crate::{
    connection::{Connector, Subscriber, Transport},
    error::InfraError,
    subscription::PubSubMessage,
};

/// Redis 接続マネージャを作成する
///
/// # エラー
///
/// - URL パースエラー: ホスト名が不正
/// - 接続エラー: Redis サーバーに接続できない
pub async fn create_connection_manager(
    settings: &ConnectionSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    let client = Client::open(settings.url())?;
    ConnectionManager::new(client).await
}

/// `ConnectionManager` で接続を確立する [`Connector`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(
        &self,
        service: &ServiceName,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn Transport>, InfraError> {
        let manager = create_connection_manager(settings)
            .await
            .map_err(|e| InfraError::connection(service.as_str(), e))?;
        Ok(Arc::new(RedisTransport::new(manager)))
    }

    async fn subscriber(
        &self,
        service: &ServiceName,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn Subscriber>, InfraError> {
        let pubsub = async { Client::open(settings.url())?.get_async_pubsub().await }
            .await
            .map_err(|e| InfraError::connection(service.as_str(), e))?;
        Ok(Box::new(RedisSubscriber { pubsub }))
    }
}

/// `ConnectionManager` を介してコマンドを送る [`Transport`]
#[derive(Clone)]
pub struct RedisTransport {
    manager: ConnectionManager,
}

impl RedisTransport {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

/// 呼び出しを `redis::Cmd` に変換する
///
/// 2 語のコマンド（`SCRIPT LOAD` など）はサブコマンドを先頭の引数として送る。
pub(crate) fn build_cmd(invocation: &CommandInvocation) -> Cmd {
    let (name, subcommand) = invocation.command().wire_parts();
    let mut cmd = redis::cmd(name);
    if let Some(subcommand) = subcommand {
        cmd.arg(subcommand);
    }
    for arg in invocation.args() {
        cmd.arg(&*arg.as_bytes());
    }
    cmd
}

#[async_trait]
impl Transport for RedisTransport {
    async fn send(&self, invocation: &CommandInvocation) -> Result<Value, InfraError> {
        let cmd = build_cmd(invocation);
        let mut conn = self.manager.clone();
        cmd.query_async::<Value>(&mut conn)
            .await
            .map_err(|e| InfraError::from_redis(invocation.command().name(), e))
    }
}

/// `redis::aio::PubSub` による [`Subscriber`]
pub struct RedisSubscriber {
    pubsub: PubSub,
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), InfraError> {
        self.pubsub
            .subscribe(channel)
            .await
            .map_err(|e| InfraError::from_redis("SUBSCRIBE", e))
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), InfraError> {
        self.pubsub
            .unsubscribe(channel)
            .await
            .map_err(|e| InfraError::from_redis("UNSUBSCRIBE", e))
    }

    async fn psubscribe(&mut self, pattern: &str) -> Result<(), InfraError> {
        self.pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| InfraError::from_redis("PSUBSCRIBE", e))
    }

    async fn punsubscribe(&mut self, pattern: &str) -> Result<(), InfraError> {
        self.pubsub
            .punsubscribe(pattern)
            .await
            .map_err(|e| InfraError::from_redis("PUNSUBSCRIBE", e))
    }

    async fn next_message(&mut self) -> Option<PubSubMessage> {
        let msg = self.pubsub.on_message().next().await?;
        let pattern = msg.get_pattern::<Option<String>>().ok().flatten();
        Some(PubSubMessage::new(
            msg.get_channel_name().to_owned(),
            pattern,
            msg.get_payload_bytes().to_vec(),
        ))
    }
}
