//! # コマンド体系
//!
//! 共有接続を通じて転送できるコマンドの列挙と、1 回分の呼び出し
//! （[`CommandInvocation`]）を定義する。
//!
//! ## 設計方針
//!
//! - コマンドごとに個別の処理は持たない。名前と位置引数をそのまま転送する
//! - 引数の個数や型はここでは検証しない。不一致はストア側のエラー応答として返る
//! - 表示名（`Display`）はストアに送るコマンド名そのもの。
//!   `SCRIPT LOAD` のような 2 語のコマンドは [`Command::wire_parts`] で分割する
//!
//! ## 別名
//!
//! 文字列からの解釈では大文字小文字を区別しない。また、以下の別名を受け付ける:
//!
//! | 別名 | コマンド |
//! |------|----------|
//! | `delete` | `DEL` |
//! | `execute` | `EXEC` |
//! | `script_load` など | `SCRIPT LOAD` など |
//!
//! ## 対象外
//!
//! `SUBSCRIBE` 系のコマンドは接続自体を購読モードに切り替えてしまうため、
//! 共有接続には載せない。購読はインフラ層の専用接続（`Subscription`）で扱い、
//! ここでは `PUBLISH` のみ列挙する。

use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{DomainError, argument::CommandArg};

/// 転送可能なコマンド
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Command {
    // ===== キー =====
    #[strum(to_string = "DEL", serialize = "DELETE")]
    Del,
    Dump,
    Exists,
    Expire,
    ExpireAt,
    Keys,
    Migrate,
    Move,
    Object,
    Persist,
    PExpire,
    PExpireAt,
    PTtl,
    RandomKey,
    Rename,
    RenameNx,
    Restore,
    Sort,
    Ttl,
    Type,

    // ===== 文字列 =====
    Append,
    BitCount,
    BitOp,
    Decr,
    DecrBy,
    Get,
    GetBit,
    GetRange,
    GetSet,
    Incr,
    IncrBy,
    IncrByFloat,
    MGet,
    MSet,
    MSetNx,
    PSetEx,
    Set,
    SetBit,
    SetEx,
    SetNx,
    SetRange,
    StrLen,

    // ===== ハッシュ =====
    HDel,
    HExists,
    HGet,
    HGetAll,
    HIncrBy,
    HIncrByFloat,
    HKeys,
    HLen,
    HMGet,
    HMSet,
    HSet,
    HSetNx,
    HVals,

    // ===== リスト =====
    BLPop,
    BRPop,
    BRPopLPush,
    LIndex,
    LInsert,
    LLen,
    LPop,
    LPush,
    LPushX,
    LRange,
    LRem,
    LSet,
    LTrim,
    RPop,
    RPopLPush,
    RPush,
    RPushX,

    // ===== セット =====
    SAdd,
    SCard,
    SDiff,
    SDiffStore,
    SInter,
    SInterStore,
    SIsMember,
    SMembers,
    SMove,
    SPop,
    SRandMember,
    SRem,
    SUnion,
    SUnionStore,

    // ===== ソート済みセット =====
    ZAdd,
    ZCard,
    ZCount,
    ZIncrBy,
    ZInterStore,
    ZRange,
    ZRangeByScore,
    ZRank,
    ZRem,
    ZRemRangeByRank,
    ZRemRangeByScore,
    ZRevRange,
    ZRevRangeByScore,
    ZRevRank,
    ZScore,
    ZUnionStore,

    // ===== スクリプト =====
    Eval,
    EvalSha,
    #[strum(to_string = "SCRIPT EXISTS", serialize = "SCRIPT_EXISTS")]
    ScriptExists,
    #[strum(to_string = "SCRIPT FLUSH", serialize = "SCRIPT_FLUSH")]
    ScriptFlush,
    #[strum(to_string = "SCRIPT KILL", serialize = "SCRIPT_KILL")]
    ScriptKill,
    #[strum(to_string = "SCRIPT LOAD", serialize = "SCRIPT_LOAD")]
    ScriptLoad,

    // ===== Pub/Sub =====
    Publish,

    // ===== トランザクション =====
    Multi,
    #[strum(to_string = "EXEC", serialize = "EXECUTE")]
    Exec,
    Discard,
    Watch,
    Unwatch,

    // ===== 接続 =====
    Ping,
    Echo,
}

/// コマンドの分類
///
/// トレーシングのフィールドとして出力し、ログの絞り込みに使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CommandGroup {
    Key,
    String,
    Hash,
    List,
    Set,
    SortedSet,
    Scripting,
    PubSub,
    Transaction,
    Connection,
}

impl Command {
    /// 文字列からコマンドを解釈する
    ///
    /// 大文字小文字は区別せず、連続する空白は 1 つにまとめて扱う。
    ///
    /// # Errors
    ///
    /// 列挙に含まれない名前の場合は [`DomainError::UnknownCommand`] を返す。
    ///
    /// ```rust
    /// use redigate_domain::command::Command;
    ///
    /// assert_eq!(Command::parse("set").unwrap(), Command::Set);
    /// assert_eq!(Command::parse("script  load").unwrap(), Command::ScriptLoad);
    /// assert_eq!(Command::parse("delete").unwrap(), Command::Del);
    /// assert!(Command::parse("flushall").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::from_str(&normalized).map_err(|_| DomainError::UnknownCommand(name.to_string()))
    }

    /// ストアに送るコマンド名を返す
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// ストアに送るトークンを (コマンド, サブコマンド) に分割して返す
    ///
    /// ```rust
    /// use redigate_domain::command::Command;
    ///
    /// assert_eq!(Command::Get.wire_parts(), ("GET", None));
    /// assert_eq!(Command::ScriptLoad.wire_parts(), ("SCRIPT", Some("LOAD")));
    /// ```
    pub fn wire_parts(self) -> (&'static str, Option<&'static str>) {
        match self.name().split_once(' ') {
            Some((command, subcommand)) => (command, Some(subcommand)),
            None => (self.name(), None),
        }
    }

    pub fn group(self) -> CommandGroup {
        use Command::*;

        match self {
            Del | Dump | Exists | Expire | ExpireAt | Keys | Migrate | Move | Object | Persist
            | PExpire | PExpireAt | PTtl | RandomKey | Rename | RenameNx | Restore | Sort | Ttl
            | Type => CommandGroup::Key,
            Append | BitCount | BitOp | Decr | DecrBy | Get | GetBit | GetRange | GetSet | Incr
            | IncrBy | IncrByFloat | MGet | MSet | MSetNx | PSetEx | Set | SetBit | SetEx
            | SetNx | SetRange | StrLen => CommandGroup::String,
            HDel | HExists | HGet | HGetAll | HIncrBy | HIncrByFloat | HKeys | HLen | HMGet
            | HMSet | HSet | HSetNx | HVals => CommandGroup::Hash,
            BLPop | BRPop | BRPopLPush | LIndex | LInsert | LLen | LPop | LPush | LPushX
            | LRange | LRem | LSet | LTrim | RPop | RPopLPush | RPush | RPushX => {
                CommandGroup::List
            }
            SAdd | SCard | SDiff | SDiffStore | SInter | SInterStore | SIsMember | SMembers
            | SMove | SPop | SRandMember | SRem | SUnion | SUnionStore => CommandGroup::Set,
            ZAdd | ZCard | ZCount | ZIncrBy | ZInterStore | ZRange | ZRangeByScore | ZRank
            | ZRem | ZRemRangeByRank | ZRemRangeByScore | ZRevRange | ZRevRangeByScore
            | ZRevRank | ZScore | ZUnionStore => CommandGroup::SortedSet,
            Eval | EvalSha | ScriptExists | ScriptFlush | ScriptKill | ScriptLoad => {
                CommandGroup::Scripting
            }
            Publish => CommandGroup::PubSub,
            Multi | Exec | Discard | Watch | Unwatch => CommandGroup::Transaction,
            Ping | Echo => CommandGroup::Connection,
        }
    }
}

/// 1 回分のコマンド呼び出し
///
/// コマンドと、順序付きの位置引数を保持する。
/// 生成（Created）後に転送（Dispatched）され、完了（Completed）か
/// 失敗（Failed）のいずれかで終わる。この遷移は呼び出し側の
/// `Future` のライフサイクルそのものであり、状態を別途保持しない。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    command: Command,
    args:    Vec<CommandArg>,
}

impl CommandInvocation {
    pub fn new(command: Command, args: impl IntoIterator<Item = impl Into<CommandArg>>) -> Self {
        Self {
            command,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn args(&self) -> &[CommandArg] {
        &self.args
    }

    pub fn into_parts(self) -> (Command, Vec<CommandArg>) {
        (self.command, self.args)
    }
}
