//! # 接続レジストリ
//!
//! サービス名ごとに共有接続ハンドルを高々 1 つ保持する。
//!
//! ## 設計方針
//!
//! - **遅延確立**: 初回アクセス時に設定を解決して接続を確立し、以降は同じハンドルを返す
//! - **スコープ**: レジストリ自体がスコープ。アプリケーション状態に 1 つ置き、
//!   リクエスト間で共有する。ハンドルはレジストリの破棄か [`clear`](ConnectionRegistry::clear)
//!   で解放される
//! - **競合**: サービス名ごとに `tokio::sync::OnceCell` を持ち、
//!   同時に来た初回呼び出しでも接続の確立は 1 回だけになる
//! - **失敗**: 確立に失敗した場合は何も保存しない。次回の呼び出しで最初からやり直す。
//!   リトライやバックオフは行わない
//! - **ヘルスチェックなし**: 保存済みのハンドルは検査せずにそのまま返す
//!
//! ロックはスロット（`OnceCell`）の取得にだけ使い、接続確立の待機中は保持しない。
//! 確立の途中で [`evict`](ConnectionRegistry::evict) や [`clear`](ConnectionRegistry::clear)
//! された場合も、確立したハンドルはレジストリに戻してから返す。

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use redigate_domain::{service::ServiceName, settings::RedisSettings};
use tokio::sync::OnceCell;

use crate::{
    connection::{ConnectionHandle, Connector},
    error::InfraError,
    subscription::Subscription,
};

type Slot = Arc<OnceCell<ConnectionHandle>>;

/// サービス名ごとの共有接続ハンドルを保持するレジストリ
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    settings:  HashMap<ServiceName, RedisSettings>,
    slots:     RwLock<HashMap<ServiceName, Slot>>,
}

impl ConnectionRegistry {
    /// 空のレジストリを作成する
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            settings: HashMap::new(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// サービスの接続設定を登録する
    ///
    /// [`handle`](Self::handle) で接続を確立する際に使われる。
    pub fn with_settings(mut self, service: ServiceName, settings: RedisSettings) -> Self {
        self.settings.insert(service, settings);
        self
    }

    /// 登録済みの接続設定を返す
    pub fn settings_for(&self, service: &ServiceName) -> Option<&RedisSettings> {
        self.settings.get(service)
    }

    /// 接続設定が登録されているサービス名（昇順）
    pub fn configured_services(&self) -> Vec<ServiceName> {
        let mut names: Vec<_> = self.settings.keys().cloned().collect();
        names.sort();
        names
    }

    /// 保存済みのハンドルを返す。なければ設定から接続を確立して保存する
    ///
    /// 保存済みの場合、`settings` は参照されない。
    ///
    /// # Errors
    ///
    /// 接続の確立に失敗した場合は [`InfraErrorKind::Connection`](crate::InfraErrorKind::Connection)
    /// を返す。この場合、レジストリには何も保存されない。
    #[tracing::instrument(skip_all, level = "debug", fields(%service))]
    pub async fn get_or_create(
        &self,
        service: &ServiceName,
        settings: &RedisSettings,
    ) -> Result<ConnectionHandle, InfraError> {
        let slot = self.slot(service);
        if let Some(handle) = slot.get() {
            tracing::trace!("既存の接続を再利用します");
            return Ok(handle.clone());
        }

        let result = slot
            .get_or_try_init(|| async {
                let resolved = settings.resolve();
                tracing::debug!(
                    host = resolved.host(),
                    port = resolved.port(),
                    db = resolved.db(),
                    "Redis への接続を確立します"
                );
                let transport = self
                    .connector
                    .connect(service, &resolved)
                    .await
                    .inspect_err(|e| tracing::warn!(error = %e, "Redis への接続に失敗しました"))?;
                Ok::<_, InfraError>(ConnectionHandle::new(service.clone(), resolved, transport))
            })
            .await;

        match result {
            Ok(handle) => Ok(self.settle(service, &slot, handle.clone())),
            Err(e) => {
                self.discard_empty(service, &slot);
                Err(e)
            }
        }
    }

    /// 登録済みの設定を使って [`get_or_create`](Self::get_or_create) する
    ///
    /// 設定が登録されていないサービスはすべてデフォルト値で接続する。
    pub async fn handle(&self, service: &ServiceName) -> Result<ConnectionHandle, InfraError> {
        let settings = self.settings_for(service).cloned().unwrap_or_default();
        self.get_or_create(service, &settings).await
    }

    /// 購読用の専用接続を確立する
    ///
    /// 登録済みの設定を使う。確立した接続はレジストリに保存せず、呼び出しごとに新しく作る。
    #[tracing::instrument(skip_all, level = "debug", fields(%service))]
    pub async fn subscription(&self, service: &ServiceName) -> Result<Subscription, InfraError> {
        let resolved = self.settings_for(service).cloned().unwrap_or_default().resolve();
        let subscriber = self
            .connector
            .subscriber(service, &resolved)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "購読用の接続に失敗しました"))?;
        tracing::debug!(host = resolved.host(), port = resolved.port(), "購読用の接続を確立しました");
        Ok(Subscription::new(service.clone(), subscriber))
    }

    /// 保存済みのハンドルを返す。接続は確立しない
    pub fn get(&self, service: &ServiceName) -> Option<ConnectionHandle> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .and_then(|slot| slot.get().cloned())
    }

    /// ハンドルが保存済みか
    pub fn contains(&self, service: &ServiceName) -> bool {
        self.get(service).is_some()
    }

    /// 保存済みのハンドルを取り除く
    ///
    /// 次回のアクセスで接続を確立し直す。取り除く前から
    /// ハンドルを保持している呼び出し元は、そのまま古い接続を使い続ける。
    ///
    /// 確立中の接続は取り除けない。確立が終わるとレジストリに戻される。
    pub fn evict(&self, service: &ServiceName) -> Option<ConnectionHandle> {
        let removed = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(service)
            .and_then(|slot| slot.get().cloned());
        if removed.is_some() {
            tracing::debug!(%service, "接続を破棄しました");
        }
        removed
    }

    /// すべてのハンドルを取り除く
    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// ハンドルが保存済みのサービス名（昇順）
    pub fn service_names(&self) -> Vec<ServiceName> {
        let mut names: Vec<_> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// 確立し終えたスロットがレジストリに残っていることを保証する
    ///
    /// 確立中に取り除かれていれば戻す。別のスロットがすでに確立済みなら、そちらのハンドルを返す。
    fn settle(&self, service: &ServiceName, slot: &Slot, handle: ConnectionHandle) -> ConnectionHandle {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let current = slots
            .get(service)
            .map(|current| (Arc::ptr_eq(current, slot), current.get().cloned()));

        match current {
            Some((true, _)) => handle,
            Some((false, Some(existing))) => existing,
            _ => {
                tracing::debug!(%service, "確立中に取り除かれたハンドルを戻します");
                slots.insert(service.clone(), Arc::clone(slot));
                handle
            }
        }
    }

    /// 確立に失敗した空のスロットを取り除く
    fn discard_empty(&self, service: &ServiceName, slot: &Slot) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(service)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized())
        {
            slots.remove(service);
        }
    }

    fn slot(&self, service: &ServiceName) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
        {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(service.clone()).or_default())
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("configured", &self.configured_services())
            .field("connected", &self.service_names())
            .finish_non_exhaustive()
    }
}
