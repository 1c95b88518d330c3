//! # アプリケーション状態
//!
//! 全リクエストで共有するスコープ。接続レジストリを 1 つだけ保持し、
//! リクエストをまたいで同じ接続ハンドルを再利用する。

use std::sync::Arc;

use redigate_domain::service::ServiceName;
use redigate_infra::{CommandDispatcher, ConnectionRegistry, Connector};

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct AppState {
    registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 設定済みのサービスを登録した状態を作成する
    pub fn from_config(config: &AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self::new(Arc::new(config.build_registry(connector)))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// デフォルトのサービス名に束縛したディスパッチャ
    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(Arc::clone(&self.registry))
    }

    pub fn dispatcher_for(&self, service: ServiceName) -> CommandDispatcher {
        CommandDispatcher::with_service(Arc::clone(&self.registry), service)
    }
}
