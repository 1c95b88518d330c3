//! # アプリケーション設定
//!
//! TOML ファイルと環境変数から設定を読み込む。環境変数が優先される。
//!
//! ## 読み込み元
//!
//! | 優先度 | 読み込み元 | 備考 |
//! |--------|------------|------|
//! | 1 | 環境変数 `REDIGATE__*` | `__` で階層を区切る |
//! | 2 | `REDIGATE_CONFIG` が指すファイル | 未設定時は `config/redigate.toml`。存在しなくてもよい |
//! | 3 | デフォルト値 | 下表 |
//!
//! ## 設定項目
//!
//! | キー | デフォルト | 環境変数の例 |
//! |------|------------|--------------|
//! | `server.host` | `0.0.0.0` | `REDIGATE__SERVER__HOST` |
//! | `server.port` | `3000` | `REDIGATE__SERVER__PORT` |
//! | `stores.<サービス名>.host` | `localhost` | `REDIGATE__STORES__REDIS__HOST` |
//! | `stores.<サービス名>.port` | `6379` | `REDIGATE__STORES__CACHE__PORT` |
//! | `stores.<サービス名>.db` | `0` | `REDIGATE__STORES__REDIS__DB` |
//!
//! `stores` が 1 つも定義されていない場合は、デフォルトのサービス名（`redis`）を
//! すべてデフォルト値で使う。
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [stores.redis]
//! host = "redis.internal"
//!
//! [stores.cache]
//! port = 6380
//! db = 1
//! ```

use std::{collections::BTreeMap, sync::Arc};

use config::{Config, ConfigError, Environment, File, FileFormat};
use redigate_domain::{service::ServiceName, settings::RedisSettings};
use redigate_infra::{ConnectionRegistry, Connector};
use serde::Deserialize;

/// 設定ファイルのパスを指定する環境変数
pub const CONFIG_PATH_ENV: &str = "REDIGATE_CONFIG";
/// 設定ファイルのデフォルトパス
pub const DEFAULT_CONFIG_PATH: &str = "config/redigate.toml";
/// 環境変数の接頭辞
pub const ENV_PREFIX: &str = "REDIGATE";

/// HTTP サーバー設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// バインドアドレス
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// `host:port` 形式のバインドアドレス
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// アプリケーション全体の設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// サービス名ごとの接続設定
    pub stores: BTreeMap<ServiceName, RedisSettings>,
}

impl AppConfig {
    /// `REDIGATE_CONFIG` のファイルと環境変数から読み込む
    ///
    /// # Errors
    ///
    /// ファイルの構文エラーや、型に合わない値がある場合はエラーを返す。
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// TOML 文字列から読み込む（環境変数は参照しない）
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// 実際に使う接続設定
    ///
    /// 1 つも定義されていなければデフォルトのサービス名をデフォルト値で返す。
    pub fn effective_stores(&self) -> BTreeMap<ServiceName, RedisSettings> {
        if self.stores.is_empty() {
            BTreeMap::from([(ServiceName::default(), RedisSettings::default())])
        } else {
            self.stores.clone()
        }
    }

    /// 設定済みのサービスを登録したレジストリを作成する
    ///
    /// 接続はまだ確立しない。
    pub fn build_registry(&self, connector: Arc<dyn Connector>) -> ConnectionRegistry {
        self.effective_stores()
            .into_iter()
            .fold(ConnectionRegistry::new(connector), |registry, (service, settings)| {
                registry.with_settings(service, settings)
            })
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
