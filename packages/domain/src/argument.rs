//! # コマンド引数
//!
//! コマンドに渡す異種混在の位置引数（[`CommandArg`]）と、
//! キーワード的なオプション（ソート条件や集約方法など）を定義する。
//!
//! オプション型はストアのコマンドリファレンスに記載された順序で
//! トークン列に展開される。値の妥当性（範囲や組み合わせ）は検証しない。

use std::borrow::Cow;

use strum::{Display, IntoStaticStr};

/// コマンドの位置引数
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    /// バイナリ値（`DUMP` の結果など）
    Bytes(Vec<u8>),
    /// 文字列（キー・値・パターンなど）
    Str(String),
    /// 整数
    Int(i64),
    /// 浮動小数点数（スコアや増分）
    Float(f64),
}

impl CommandArg {
    /// ストアに送るバイト列表現を返す
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Bytes(bytes) => Cow::Borrowed(bytes),
            Self::Str(s) => Cow::Borrowed(s.as_bytes()),
            Self::Int(i) => Cow::Owned(i.to_string().into_bytes()),
            Self::Float(f) => Cow::Owned(format_float(*f).into_bytes()),
        }
    }
}

/// 浮動小数点数をストアが解釈できる形式に整形する
///
/// 無限大は `+inf` / `-inf` で表す。
fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value.is_sign_positive() {
            "+inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else {
        value.to_string()
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for CommandArg {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<Vec<u8>> for CommandArg {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for CommandArg {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<i64> for CommandArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CommandArg {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for CommandArg {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u16> for CommandArg {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for CommandArg {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&CommandArg> for CommandArg {
    fn from(value: &CommandArg) -> Self {
        value.clone()
    }
}

/// `LINSERT` の挿入位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum InsertPosition {
    Before,
    After,
}

/// `BITOP` の演算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BitOperation {
    And,
    Or,
    Xor,
    Not,
}

/// `ZINTERSTORE` / `ZUNIONSTORE` の集約方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

macro_rules! impl_static_str_arg {
    ($($Name:ident),* $(,)?) => {
        $(
            impl From<$Name> for CommandArg {
                fn from(value: $Name) -> Self {
                    let token: &'static str = value.into();
                    Self::Str(token.to_string())
                }
            }
        )*
    };
}

impl_static_str_arg!(InsertPosition, BitOperation, Aggregate);

/// `LIMIT offset count` 句
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: i64,
    pub count:  i64,
}

impl Limit {
    pub fn new(offset: i64, count: i64) -> Self {
        Self { offset, count }
    }

    fn push_args(self, args: &mut Vec<CommandArg>) {
        args.push("LIMIT".into());
        args.push(self.offset.into());
        args.push(self.count.into());
    }
}

/// `SORT` のオプション
///
/// `SORT key [BY pattern] [LIMIT offset count] [GET pattern ...] [DESC] [ALPHA] [STORE dest]`
/// の順で展開する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    pub by:    Option<String>,
    pub limit: Option<Limit>,
    pub get:   Vec<String>,
    pub desc:  bool,
    pub alpha: bool,
    pub store: Option<String>,
}

impl SortOptions {
    pub fn to_args(&self) -> Vec<CommandArg> {
        let mut args = Vec::new();
        if let Some(by) = &self.by {
            args.push("BY".into());
            args.push(by.into());
        }
        if let Some(limit) = self.limit {
            limit.push_args(&mut args);
        }
        for pattern in &self.get {
            args.push("GET".into());
            args.push(pattern.into());
        }
        if self.desc {
            args.push("DESC".into());
        }
        if self.alpha {
            args.push("ALPHA".into());
        }
        if let Some(store) = &self.store {
            args.push("STORE".into());
            args.push(store.into());
        }
        args
    }
}

/// `ZRANGEBYSCORE` / `ZREVRANGEBYSCORE` のオプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreRangeOptions {
    pub with_scores: bool,
    pub limit:       Option<Limit>,
}

impl ScoreRangeOptions {
    pub fn to_args(self) -> Vec<CommandArg> {
        let mut args = Vec::new();
        if self.with_scores {
            args.push("WITHSCORES".into());
        }
        if let Some(limit) = self.limit {
            limit.push_args(&mut args);
        }
        args
    }
}

/// `ZINTERSTORE` / `ZUNIONSTORE` のオプション
///
/// `numkeys` はキーの数から導出する。`weights` が空の場合は `WEIGHTS` 句を省略する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSetOptions {
    pub weights:   Vec<f64>,
    pub aggregate: Option<Aggregate>,
}

impl StoreSetOptions {
    pub fn to_args(&self, destination: CommandArg, keys: Vec<CommandArg>) -> Vec<CommandArg> {
        let numkeys = i64::try_from(keys.len()).unwrap_or(i64::MAX);
        let mut args = Vec::with_capacity(keys.len() + self.weights.len() + 5);
        args.push(destination);
        args.push(numkeys.into());
        args.extend(keys);
        if !self.weights.is_empty() {
            args.push("WEIGHTS".into());
            args.extend(self.weights.iter().map(|w| CommandArg::Float(*w)));
        }
        if let Some(aggregate) = self.aggregate {
            args.push("AGGREGATE".into());
            args.push(aggregate.into());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn strs(tokens: &[&str]) -> Vec<CommandArg> {
        tokens.iter().map(|t| CommandArg::from(*t)).collect()
    }

    #[rstest]
    #[case(CommandArg::from("key"), b"key".to_vec())]
    #[case(CommandArg::from(42), b"42".to_vec())]
    #[case(CommandArg::from(-7i64), b"-7".to_vec())]
    #[case(CommandArg::from(1.5), b"1.5".to_vec())]
    #[case(CommandArg::from(f64::INFINITY), b"+inf".to_vec())]
    #[case(CommandArg::from(f64::NEG_INFINITY), b"-inf".to_vec())]
    #[case(CommandArg::from(vec![0u8, 255]), vec![0u8, 255])]
    fn test_引数のバイト列表現(#[case] arg: CommandArg, #[case] expected: Vec<u8>) {
        assert_eq!(arg.as_bytes().into_owned(), expected);
    }

    #[test]
    fn test_オプション列挙はトークンに変換される() {
        assert_eq!(CommandArg::from(InsertPosition::Before), CommandArg::from("BEFORE"));
        assert_eq!(CommandArg::from(BitOperation::Xor), CommandArg::from("XOR"));
        assert_eq!(CommandArg::from(Aggregate::Max), CommandArg::from("MAX"));
    }

    #[test]
    fn test_sortオプションはリファレンスの順序で展開される() {
        let options = SortOptions {
            by:    Some("weight_*".into()),
            limit: Some(Limit::new(0, 10)),
            get:   vec!["#".into(), "object_*".into()],
            desc:  true,
            alpha: true,
            store: Some("sorted".into()),
        };

        let mut expected = strs(&["BY", "weight_*", "LIMIT"]);
        expected.extend([CommandArg::Int(0), CommandArg::Int(10)]);
        expected.extend(strs(&["GET", "#", "GET", "object_*", "DESC", "ALPHA", "STORE", "sorted"]));
        assert_eq!(options.to_args(), expected);
    }

    #[test]
    fn test_sortオプション未指定なら引数は空() {
        assert!(SortOptions::default().to_args().is_empty());
    }

    #[test]
    fn test_スコア範囲オプションの展開() {
        let options = ScoreRangeOptions {
            with_scores: true,
            limit:       Some(Limit::new(5, 20)),
        };

        assert_eq!(options.to_args(), vec![
            CommandArg::from("WITHSCORES"),
            CommandArg::from("LIMIT"),
            CommandArg::Int(5),
            CommandArg::Int(20),
        ]);
    }

    #[test]
    fn test_集合ストアオプションはnumkeysを導出する() {
        let options = StoreSetOptions {
            weights:   vec![1.0, 2.5],
            aggregate: Some(Aggregate::Min),
        };

        let args = options.to_args("out".into(), vec!["a".into(), "b".into()]);

        assert_eq!(args, vec![
            CommandArg::from("out"),
            CommandArg::Int(2),
            CommandArg::from("a"),
            CommandArg::from("b"),
            CommandArg::from("WEIGHTS"),
            CommandArg::Float(1.0),
            CommandArg::Float(2.5),
            CommandArg::from("AGGREGATE"),
            CommandArg::from("MIN"),
        ]);
    }

    #[test]
    fn test_重みが空ならweights句を省略する() {
        let args = StoreSetOptions::default().to_args("out".into(), vec!["a".into()]);

        assert_eq!(args, vec![
            CommandArg::from("out"),
            CommandArg::Int(1),
            CommandArg::from("a"),
        ]);
    }
}
