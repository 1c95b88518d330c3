//! # インフラ層エラー定義
//!
//! 接続の確立とコマンドの転送で発生するエラーを表現する。
//!
//! ## エラー分類
//!
//! | 種別 | 発生箇所 | 内容 |
//! |------|----------|------|
//! | `Connection` | `ConnectionRegistry::get_or_create` | 接続の確立に失敗（到達不能・接続拒否） |
//! | `Command` | `CommandDispatcher::execute` | 転送中の失敗（タイムアウト・切断・I/O・応答のパース失敗） |
//! | `StoreReported` | `CommandDispatcher::execute` | ストアがエラー応答を返した |
//! | `UnknownCommand` | `CommandDispatcher::execute_named` | 列挙にないコマンド名 |
//!
//! いずれもこの層では握りつぶさず、呼び出し元にそのまま返す。
//! リトライやログ出力の判断は呼び出し元の責務とする。
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別

use std::fmt;

use derive_more::Display;
use redigate_domain::DomainError;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別と、生成時点の [`SpanTrace`]（呼び出し経路）を保持する。
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// 接続の確立に失敗した
    ///
    /// レジストリには何も保存されず、次回の呼び出しで改めて確立を試みる。
    #[error("Redis への接続に失敗しました（service={service}）: {source}")]
    Connection {
        service: String,
        #[source]
        source:  redis::RedisError,
    },

    /// 転送中にトランスポートが失敗した
    #[error("コマンドの転送に失敗しました（{command}）: {source}")]
    Command {
        command: &'static str,
        #[source]
        source:  redis::RedisError,
    },

    /// ストアがエラー応答を返した
    ///
    /// 応答メッセージは変換せずにそのまま保持する。
    #[error("Redis がエラーを返しました（{command}）: {message}")]
    StoreReported {
        command: &'static str,
        message: String,
    },

    /// 列挙にないコマンド名
    #[error(transparent)]
    UnknownCommand(DomainError),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

// ===== InfraError のメソッド =====

impl InfraError {
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    pub fn into_parts(self) -> (InfraErrorKind, SpanTrace) {
        (self.kind, self.span_trace)
    }

    pub fn is_connection(&self) -> bool {
        matches!(self.kind, InfraErrorKind::Connection { .. })
    }

    pub fn is_command(&self) -> bool {
        matches!(self.kind, InfraErrorKind::Command { .. })
    }

    pub fn is_store_reported(&self) -> bool {
        matches!(self.kind, InfraErrorKind::StoreReported { .. })
    }

    // ===== Convenience constructors =====

    fn from_kind(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    /// 接続エラーを生成する
    pub fn connection(service: impl Into<String>, source: redis::RedisError) -> Self {
        Self::from_kind(InfraErrorKind::Connection {
            service: service.into(),
            source,
        })
    }

    /// 転送エラーを生成する
    pub fn command(command: &'static str, source: redis::RedisError) -> Self {
        Self::from_kind(InfraErrorKind::Command { command, source })
    }

    /// ストアが返したエラー応答を生成する
    pub fn store_reported(command: &'static str, message: impl Into<String>) -> Self {
        Self::from_kind(InfraErrorKind::StoreReported {
            command,
            message: message.into(),
        })
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::from_kind(InfraErrorKind::Unexpected(msg.into()))
    }

    /// `redis` クレートのエラーを転送エラーとストア応答エラーに振り分ける
    ///
    /// ストア自身が返したエラー応答（`Server` / `Extension`）だけをストア応答エラーとし、
    /// I/O・タイムアウト・切断・応答のパース失敗などはすべて転送エラーとする。
    pub fn from_redis(command: &'static str, source: redis::RedisError) -> Self {
        if matches!(
            source.kind(),
            redis::ErrorKind::Server(_) | redis::ErrorKind::Extension
        ) {
            Self::store_reported(command, source.to_string())
        } else {
            Self::command(command, source)
        }
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<DomainError> for InfraError {
    fn from(source: DomainError) -> Self {
        Self::from_kind(InfraErrorKind::UnknownCommand(source))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;

    /// テスト用に ErrorLayer 付き subscriber を設定する
    fn with_error_layer(f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(tracing_error::ErrorLayer::default());
        let _guard = tracing::subscriber::set_default(subscriber);
        f();
    }

    fn io_error() -> redis::RedisError {
        (redis::ErrorKind::Io, "接続が切断されました").into()
    }

    #[test]
    fn test_接続エラーでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("test_get_or_create", service = "redis");
            let _enter = span.enter();

            let err = InfraError::connection("redis", io_error());

            assert!(err.is_connection());
            let trace_str = format!("{}", err.span_trace());
            assert!(
                trace_str.contains("test_get_or_create"),
                "SpanTrace がスパン名を含むこと: {trace_str}",
            );
        });
    }

    #[rstest]
    #[case::io(redis::ErrorKind::Io)]
    #[case::パース失敗(redis::ErrorKind::Parse)]
    #[case::クライアント(redis::ErrorKind::Client)]
    #[case::型の不一致(redis::ErrorKind::UnexpectedReturnType)]
    #[case::設定不備(redis::ErrorKind::InvalidClientConfig)]
    #[case::認証失敗(redis::ErrorKind::AuthenticationFailed)]
    fn test_ストア以外に起因するエラーは転送エラーに分類される(#[case] kind: redis::ErrorKind) {
        let source: redis::RedisError = (kind, "invalid response", "protocol violation".to_string()).into();

        let err = InfraError::from_redis("GET", source);

        assert!(err.is_command(), "{err:?}");
        assert!(!err.is_store_reported());
    }

    #[rstest]
    #[case::応答エラー(redis::ErrorKind::Server(redis::ServerErrorKind::ResponseError))]
    #[case::スクリプトなし(redis::ErrorKind::Server(redis::ServerErrorKind::NoScript))]
    #[case::拡張エラー(redis::ErrorKind::Extension)]
    fn test_ストアが返したエラー応答はストア応答エラーに分類される(#[case] kind: redis::ErrorKind) {
        let source: redis::RedisError = (kind, "WRONGTYPE").into();

        let err = InfraError::from_redis("INCR", source);

        assert!(err.is_store_reported(), "{err:?}");
        assert!(!err.is_command());
    }

    #[test]
    fn test_ストア応答エラーはメッセージをそのまま保持する() {
        let err = InfraError::store_reported("INCR", "ERR value is not an integer or out of range");

        assert_eq!(
            err.to_string(),
            "Redis がエラーを返しました（INCR）: ERR value is not an integer or out of range"
        );
    }

    #[test]
    fn test_ドメインエラーはunknown_commandに変換される() {
        let err: InfraError = DomainError::UnknownCommand("FLUSHALL".to_string()).into();

        assert!(matches!(err.kind(), InfraErrorKind::UnknownCommand(_)));
        assert_eq!(err.to_string(), "未対応のコマンドです: FLUSHALL");
    }

    #[test]
    fn test_sourceがinfra_error_kindに委譲する() {
        use std::error::Error;

        let err = InfraError::command("SET", io_error());

        assert!(err.source().is_some());
    }
}
