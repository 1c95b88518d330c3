//! # サービス名
//!
//! 共有接続をキャッシュする際のキーとなる論理名。
//!
//! 1 つのアプリケーションスコープ内で、サービス名ごとに接続ハンドルは
//! 高々 1 つだけ存在する。複数の Redis を使い分ける場合は、
//! サービス名を変えて別々に登録する。
//!
//! ```rust
//! use redigate_domain::service::{DEFAULT_SERVICE_NAME, ServiceName};
//!
//! let default = ServiceName::default();
//! assert_eq!(default.as_str(), DEFAULT_SERVICE_NAME);
//!
//! let cache = ServiceName::new("cache").unwrap();
//! assert_eq!(cache.to_string(), "cache");
//! ```

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// デフォルトのサービス名
pub const DEFAULT_SERVICE_NAME: &str = "redis";

/// 接続ハンドルを識別する論理名
///
/// 前後の空白は取り除かれ、空文字列は受け付けない。
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("{_0}")]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// サービス名を作成する
    ///
    /// # Errors
    ///
    /// 空白のみ、または空文字列の場合は [`DomainError::Validation`] を返す。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(DomainError::Validation(
                "サービス名は必須です".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ServiceName {
    fn default() -> Self {
        Self(DEFAULT_SERVICE_NAME.to_string())
    }
}

impl TryFrom<String> for ServiceName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceName> for String {
    fn from(value: ServiceName) -> Self {
        value.0
    }
}
