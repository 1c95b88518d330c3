//! # 接続設定
//!
//! 設定マッピング（[`RedisSettings`]）から、実際の接続に使う
//! 解決済みの設定（[`ConnectionSettings`]）を導出する。
//!
//! ## デフォルト値
//!
//! | キー | 型 | デフォルト |
//! |------|----|------------|
//! | `host` | 文字列 | `localhost` |
//! | `port` | 整数 | `6379` |
//! | `db` | 整数 | `0` |
//!
//! 解決は純粋関数であり、同じマッピングからは常に同じ結果が得られる。
//! 明示的に指定されたフィールドはそのまま残り、欠けているフィールドだけが
//! デフォルト値で埋められる。

use serde::{Deserialize, Serialize};

/// ホスト名のデフォルト値
pub const DEFAULT_HOST: &str = "localhost";
/// ポート番号のデフォルト値
pub const DEFAULT_PORT: u16 = 6379;
/// 論理データベース番号のデフォルト値
pub const DEFAULT_DB: i64 = 0;

/// 設定ファイルや環境変数から読み込まれる生の接続設定
///
/// すべてのフィールドは省略可能。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db:   Option<i64>,
}

impl RedisSettings {
    /// 欠けているフィールドをデフォルト値で埋めて解決する
    pub fn resolve(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            db:   self.db.unwrap_or(DEFAULT_DB),
        }
    }
}

/// 解決済みの接続設定
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionSettings {
    host: String,
    port: u16,
    db:   i64,
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, port: u16, db: i64) -> Self {
        Self {
            host: host.into(),
            port,
            db,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> i64 {
        self.db
    }

    /// `redis://host:port/db` 形式の接続 URL を返す
    ///
    /// IPv6 アドレスは角括弧で囲む。
    pub fn url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("redis://[{}]:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        RedisSettings::default().resolve()
    }
}
