//! # 接続ハンドル
//!
//! 共有接続 1 本分を表す [`ConnectionHandle`] と、接続の確立・転送を
//! 抽象化する [`Connector`] / [`Transport`] トレイトを定義する。
//!
//! ## 設計方針
//!
//! - ハンドルは `Arc` で内部を共有する。クローンしても同じ接続を指し、
//!   同一性は [`ConnectionHandle::ptr_eq`] で確認できる
//! - トランスポートは `async_trait` でトレイトオブジェクト化し、
//!   本番（`redis` クレート）とテスト（インメモリ）を差し替える
//! - 同じハンドルに対する 1 呼び出し元からの送信順序は保たれる。
//!   呼び出し元をまたいだ順序は保証しない
//! - 購読（[`Subscriber`]）は共有接続を使わず、呼び出しごとに専用の接続を確立する

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use redigate_domain::{command::CommandInvocation, service::ServiceName, settings::ConnectionSettings};
use redis::Value;

use crate::{error::InfraError, subscription::PubSubMessage};

/// コマンドをストアへ送る経路
#[async_trait]
pub trait Transport: Send + Sync {
    /// コマンドを 1 つ送り、応答を待つ
    ///
    /// 応答が得られるまで呼び出し元のタスクを中断する。
    async fn send(&self, invocation: &CommandInvocation) -> Result<Value, InfraError>;
}

/// 接続を確立する
///
/// [`ConnectionRegistry`](crate::ConnectionRegistry) がサービス名ごとに
/// 初回アクセス時のみ呼び出す。
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        service: &ServiceName,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn Transport>, InfraError>;

    /// 購読専用の接続を確立する
    async fn subscriber(
        &self,
        service: &ServiceName,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn Subscriber>, InfraError>;
}

/// 購読モードの専用接続
#[async_trait]
pub trait Subscriber: Send {
    async fn subscribe(&mut self, channel: &str) -> Result<(), InfraError>;
    async fn unsubscribe(&mut self, channel: &str) -> Result<(), InfraError>;
    async fn psubscribe(&mut self, pattern: &str) -> Result<(), InfraError>;
    async fn punsubscribe(&mut self, pattern: &str) -> Result<(), InfraError>;

    /// 次のメッセージを待つ。接続が閉じていれば `None`
    async fn next_message(&mut self) -> Option<PubSubMessage>;
}

/// 共有接続 1 本分のハンドル
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    service:   ServiceName,
    settings:  ConnectionSettings,
    transport: Arc<dyn Transport>,
}

impl ConnectionHandle {
    pub fn new(
        service: ServiceName,
        settings: ConnectionSettings,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                service,
                settings,
                transport,
            }),
        }
    }

    pub fn service(&self) -> &ServiceName {
        &self.inner.service
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    /// 2 つのハンドルが同じ接続を指しているか
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// コマンドを送り、応答をそのまま返す
    pub async fn send(&self, invocation: &CommandInvocation) -> Result<Value, InfraError> {
        self.inner.transport.send(invocation).await
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("service", &self.inner.service)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use redigate_domain::command::Command;

    use super::*;
    use crate::mock::MockTransport;

    fn handle() -> ConnectionHandle {
        ConnectionHandle::new(
            ServiceName::default(),
            ConnectionSettings::default(),
            Arc::new(MockTransport::new()),
        )
    }

    #[test]
    fn test_クローンは同じ接続を指す() {
        let handle = handle();
        let cloned = handle.clone();

        assert!(handle.ptr_eq(&cloned));
    }

    #[test]
    fn test_別々に作成したハンドルは同一ではない() {
        assert!(!handle().ptr_eq(&handle()));
    }

    #[tokio::test]
    async fn test_sendはトランスポートに委譲する() {
        let transport = Arc::new(MockTransport::new());
        let handle = ConnectionHandle::new(
            ServiceName::default(),
            ConnectionSettings::default(),
            transport.clone(),
        );

        let value = handle
            .send(&CommandInvocation::new(Command::Echo, ["hello"]))
            .await
            .unwrap();

        assert_eq!(value, Value::BulkString(b"hello".to_vec()));
        assert_eq!(transport.observed_commands(), vec![Command::Echo]);
    }

    #[test]
    fn test_debug出力にトランスポートを含めない() {
        let debug = format!("{:?}", handle());

        assert!(debug.contains("ConnectionHandle"));
        assert!(debug.contains("redis"));
        assert!(!debug.contains("transport"));
    }
}
