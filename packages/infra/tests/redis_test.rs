//! RedisConnector 統合テスト
//!
//! 実際の Redis に接続して検証する。既定では実行しない。
//! テストごとに固有のキー接頭辞を使い、終了時に削除する。
//!
//! 実行方法:
//! ```bash
//! docker run --rm -p 16379:6379 redis:7
//! REDIS_PORT=16379 cargo test -p redigate-infra --test redis_test -- --ignored
//! ```

use std::sync::Arc;

use pretty_assertions::assert_eq;
use redigate_domain::{service::ServiceName, settings::RedisSettings};
use redigate_infra::{CommandDispatcher, ConnectionRegistry, Value, redis::RedisConnector};

/// テスト用の接続設定
fn settings() -> RedisSettings {
    RedisSettings {
        host: std::env::var("REDIS_HOST").ok(),
        port: std::env::var("REDIS_PORT").ok().and_then(|p| p.parse().ok()),
        db:   Some(15),
    }
}

fn dispatcher() -> CommandDispatcher {
    let registry =
        ConnectionRegistry::new(Arc::new(RedisConnector)).with_settings(ServiceName::default(), settings());
    CommandDispatcher::new(Arc::new(registry))
}

#[tokio::test]
#[ignore = "Redis が必要"]
async fn test_setしたキーをgetで取得できる() {
    let redis = dispatcher();
    let key = "redigate:test:set_get";

    redis.set(key, "hello").await.unwrap();
    let value = redis.get(key).await.unwrap();

    assert_eq!(value, Value::BulkString(b"hello".to_vec()));
    redis.del([key]).await.unwrap();
}

#[tokio::test]
#[ignore = "Redis が必要"]
async fn test_存在しないキーはnilを返す() {
    let redis = dispatcher();

    let value = redis.get("redigate:test:missing").await.unwrap();

    assert_eq!(value, Value::Nil);
}

#[tokio::test]
#[ignore = "Redis が必要"]
async fn test_型の不一致はストアのエラー応答になる() {
    let redis = dispatcher();
    let key = "redigate:test:wrongtype";
    redis.rpush(key, ["a"]).await.unwrap();

    let err = redis.incr(key).await.unwrap_err();

    assert!(err.is_store_reported(), "{err:?}");
    redis.del([key]).await.unwrap();
}

#[tokio::test]
#[ignore = "Redis が必要"]
async fn test_スクリプトを登録して実行できる() {
    let redis = dispatcher();

    let sha1 = match redis.script_load("return ARGV[1]").await.unwrap() {
        Value::BulkString(bytes) => String::from_utf8(bytes).unwrap(),
        other => panic!("想定外の応答: {other:?}"),
    };
    let value = redis
        .evalsha(sha1, Vec::<String>::new(), ["echoed"])
        .await
        .unwrap();

    assert_eq!(value, Value::BulkString(b"echoed".to_vec()));
}

#[tokio::test]
#[ignore = "Redis が必要"]
async fn test_到達できないホストは接続エラーになる() {
    let registry = ConnectionRegistry::new(Arc::new(RedisConnector));
    let unreachable = RedisSettings {
        host: Some("127.0.0.1".into()),
        port: Some(1),
        db:   None,
    };

    let result = registry
        .get_or_create(&ServiceName::default(), &unreachable)
        .await;

    assert!(result.unwrap_err().is_connection());
    assert!(registry.get(&ServiceName::default()).is_none());
}

#[tokio::test]
#[ignore = "Redis が必要"]
async fn test_購読したチャンネルへのpublishを受信できる() {
    let redis = dispatcher();
    let mut subscription = redis.subscription().await.unwrap();
    subscription.subscribe(["redigate:test:news"]).await.unwrap();

    redis.publish("redigate:test:news", "hello").await.unwrap();
    let message = tokio::time::timeout(std::time::Duration::from_secs(5), subscription.next_message())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(message.channel(), "redigate:test:news");
    assert_eq!(message.payload(), b"hello");
}
