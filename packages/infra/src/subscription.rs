//! # Pub/Sub 購読
//!
//! `SUBSCRIBE` 系のコマンドは接続を購読モードに切り替え、以降は通常のコマンドを
//! 受け付けなくなる。そのため共有接続には載せず、[`Subscription`] ごとに
//! 専用の接続を確立する。
//!
//! - 専用接続はレジストリに保存しない。[`Subscription`] を破棄すると閉じる
//! - 接続設定は共有接続と同じもの（サービス名ごとの登録値）を使う
//! - `PUBLISH` は購読モードにならないため、共有接続から
//!   [`CommandDispatcher::publish`](crate::CommandDispatcher::publish) で送る
//!
//! ```rust,ignore
//! let mut subscription = redis.subscription().await?;
//! subscription.subscribe(["news"]).await?;
//!
//! while let Some(message) = subscription.next_message().await {
//!     tracing::info!(channel = message.channel(), "受信しました");
//! }
//! ```

use std::fmt;

use derive_more::Constructor;
use redigate_domain::service::ServiceName;

use crate::{connection::Subscriber, error::InfraError};

/// 購読中のチャンネルに届いたメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct PubSubMessage {
    channel: String,
    pattern: Option<String>,
    payload: Vec<u8>,
}

impl PubSubMessage {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// パターン購読で受信した場合、一致したパターン
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Subscribe,
    Unsubscribe,
    PSubscribe,
    PUnsubscribe,
}

/// 1 本の専用接続上の購読
pub struct Subscription {
    service:    ServiceName,
    subscriber: Box<dyn Subscriber>,
}

impl Subscription {
    pub(crate) fn new(service: ServiceName, subscriber: Box<dyn Subscriber>) -> Self {
        Self {
            service,
            subscriber,
        }
    }

    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// チャンネルを購読する
    pub async fn subscribe<S: AsRef<str>>(
        &mut self,
        channels: impl IntoIterator<Item = S>,
    ) -> Result<(), InfraError> {
        self.apply(Action::Subscribe, collect(channels)).await
    }

    pub async fn unsubscribe<S: AsRef<str>>(
        &mut self,
        channels: impl IntoIterator<Item = S>,
    ) -> Result<(), InfraError> {
        self.apply(Action::Unsubscribe, collect(channels)).await
    }

    /// glob 形式のパターン（`news.*` など）で購読する
    pub async fn psubscribe<S: AsRef<str>>(
        &mut self,
        patterns: impl IntoIterator<Item = S>,
    ) -> Result<(), InfraError> {
        self.apply(Action::PSubscribe, collect(patterns)).await
    }

    pub async fn punsubscribe<S: AsRef<str>>(
        &mut self,
        patterns: impl IntoIterator<Item = S>,
    ) -> Result<(), InfraError> {
        self.apply(Action::PUnsubscribe, collect(patterns)).await
    }

    /// 次のメッセージが届くまで待つ
    ///
    /// 接続が閉じていれば `None` を返す。
    pub async fn next_message(&mut self) -> Option<PubSubMessage> {
        self.subscriber.next_message().await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(service = %self.service, ?action))]
    async fn apply(&mut self, action: Action, targets: Vec<String>) -> Result<(), InfraError> {
        for target in &targets {
            match action {
                Action::Subscribe => self.subscriber.subscribe(target).await?,
                Action::Unsubscribe => self.subscriber.unsubscribe(target).await?,
                Action::PSubscribe => self.subscriber.psubscribe(target).await?,
                Action::PUnsubscribe => self.subscriber.punsubscribe(target).await?,
            }
        }
        tracing::debug!(?targets, "購読を更新しました");
        Ok(())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

fn collect<S: AsRef<str>>(targets: impl IntoIterator<Item = S>) -> Vec<String> {
    targets
        .into_iter()
        .map(|target| target.as_ref().to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use pretty_assertions::assert_eq;
    use redis::Value;

    use super::*;
    use crate::{CommandDispatcher, ConnectionRegistry, mock::MockConnector};

    fn setup() -> (Arc<MockConnector>, CommandDispatcher) {
        let connector = Arc::new(MockConnector::new());
        let registry = Arc::new(ConnectionRegistry::new(connector.clone()));
        (connector, CommandDispatcher::new(registry))
    }

    async fn receive(subscription: &mut Subscription) -> PubSubMessage {
        tokio::time::timeout(Duration::from_secs(1), subscription.next_message())
            .await
            .expect("メッセージが届くこと")
            .expect("接続が開いていること")
    }

    #[tokio::test]
    async fn test_購読したチャンネルにpublishした値を受信できる() {
        let (_, redis) = setup();
        let mut subscription = redis.subscription().await.unwrap();
        subscription.subscribe(["news"]).await.unwrap();

        let receivers = redis.publish("news", "hello").await.unwrap();
        let message = receive(&mut subscription).await;

        assert_eq!(receivers, Value::Int(1));
        assert_eq!(
            message,
            PubSubMessage::new("news".into(), None, b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn test_パターン購読では一致したパターンも受け取る() {
        let (_, redis) = setup();
        let mut subscription = redis.subscription().await.unwrap();
        subscription.psubscribe(["news.*"]).await.unwrap();

        redis.publish("news.sports", "goal").await.unwrap();
        let message = receive(&mut subscription).await;

        assert_eq!(message.channel(), "news.sports");
        assert_eq!(message.pattern(), Some("news.*"));
        assert_eq!(message.payload(), b"goal");
    }

    #[tokio::test]
    async fn test_購読解除したチャンネルには届かない() {
        let (_, redis) = setup();
        let mut subscription = redis.subscription().await.unwrap();
        subscription.subscribe(["news", "weather"]).await.unwrap();

        subscription.unsubscribe(["news"]).await.unwrap();
        let receivers = redis.publish("news", "hello").await.unwrap();

        assert_eq!(receivers, Value::Int(0));
    }

    #[tokio::test]
    async fn test_購読は共有接続とは別の接続を使う() {
        let (connector, redis) = setup();

        let _first = redis.subscription().await.unwrap();
        let _second = redis.subscription().await.unwrap();

        assert_eq!(connector.subscriber_count(), 2);
        assert_eq!(connector.connect_count(), 0);
        assert!(redis.registry().service_names().is_empty());
    }

    #[tokio::test]
    async fn test_専用接続を確立できなければ接続エラー() {
        let (connector, redis) = setup();
        connector.set_failing(true);

        let err = redis.subscription().await.unwrap_err();

        assert!(err.is_connection());
    }
}
