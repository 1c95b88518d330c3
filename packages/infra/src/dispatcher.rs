//! # コマンドディスパッチャ
//!
//! コマンドと位置引数を、レジストリから取得した共有接続へそのまま転送する。
//!
//! ## 設計方針
//!
//! - 呼び出しのたびにレジストリからハンドルを取得する。自分では接続を作らず、
//!   ハンドルも保持しない。レジストリ側の差し替えは次の呼び出しから反映される
//! - 引数は順序どおりに転送する。並べ替え・まとめ送り・リトライ・型変換はしない
//! - 応答は `redis::Value` のまま返す（スカラー・配列・マップ・`Nil`）
//!
//! コマンドごとの型付きラッパーは [`crate::commands`] で生成している。

use std::sync::Arc;

use redigate_domain::{
    argument::CommandArg,
    command::{Command, CommandInvocation},
    service::ServiceName,
};
use redis::Value;

use crate::{error::InfraError, registry::ConnectionRegistry, subscription::Subscription};

/// 1 つのサービス名に束縛されたコマンドの呼び出し口
///
/// Clone は安価で、リクエストハンドラごとに複製して使う。
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    registry: Arc<ConnectionRegistry>,
    service:  ServiceName,
}

impl CommandDispatcher {
    /// デフォルトのサービス名（`redis`）に束縛する
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_service(registry, ServiceName::default())
    }

    pub fn with_service(registry: Arc<ConnectionRegistry>, service: ServiceName) -> Self {
        Self { registry, service }
    }

    /// 同じレジストリを使い、別のサービス名に束縛したディスパッチャを返す
    pub fn for_service(&self, service: ServiceName) -> Self {
        Self::with_service(Arc::clone(&self.registry), service)
    }

    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// このサービスに購読用の専用接続を確立する
    ///
    /// 詳細は [`crate::subscription`] を参照。
    pub async fn subscription(&self) -> Result<Subscription, InfraError> {
        self.registry.subscription(&self.service).await
    }

    /// コマンドを転送し、応答を待つ
    ///
    /// # Errors
    ///
    /// - 接続の確立に失敗した: [`InfraErrorKind::Connection`](crate::InfraErrorKind::Connection)
    /// - 転送中に失敗した: [`InfraErrorKind::Command`](crate::InfraErrorKind::Command)
    /// - ストアがエラーを返した: [`InfraErrorKind::StoreReported`](crate::InfraErrorKind::StoreReported)
    pub async fn execute(&self, command: Command, args: Vec<CommandArg>) -> Result<Value, InfraError> {
        self.invoke(CommandInvocation::new(command, args)).await
    }

    /// 名前で指定したコマンドを転送する
    ///
    /// 名前は大文字小文字を区別しない。`delete` や `execute` などの別名も受け付ける。
    ///
    /// # Errors
    ///
    /// 列挙にない名前の場合、転送せずに
    /// [`InfraErrorKind::UnknownCommand`](crate::InfraErrorKind::UnknownCommand) を返す。
    pub async fn execute_named(&self, name: &str, args: Vec<CommandArg>) -> Result<Value, InfraError> {
        let command = Command::parse(name)?;
        self.execute(command, args).await
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(
            service = %self.service,
            command = %invocation.command(),
            group = %invocation.command().group(),
        )
    )]
    async fn invoke(&self, invocation: CommandInvocation) -> Result<Value, InfraError> {
        let handle = self.registry.handle(&self.service).await?;
        handle
            .send(&invocation)
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "コマンドが失敗しました"))
    }
}
