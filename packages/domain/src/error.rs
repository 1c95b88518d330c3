//! # ドメイン層エラー定義
//!
//! コマンド名の解釈や値オブジェクトの生成で発生するエラー。
//!
//! ストアへの接続失敗やコマンド実行失敗はインフラ層の責務であり、
//! ここには含めない。

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// 転送対象として登録されていないコマンド名
    ///
    /// 文字列からコマンドを解釈する経路（[`crate::command::Command::parse`]）でのみ発生する。
    /// 型付きのラッパーを使う限り、このエラーは起こらない。
    #[error("未対応のコマンドです: {0}")]
    UnknownCommand(String),

    /// バリデーションエラー
    ///
    /// 空のサービス名など、値オブジェクトの不変条件に違反した場合に使用する。
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}
