//! # コマンドごとの型付きラッパー
//!
//! [`CommandDispatcher::execute`] に委譲するだけの薄いメソッド群。
//! 独自の処理は持たない。引数の個数や型の不一致はストアのエラー応答として返る。
//!
//! 大半は `commands!` マクロで生成する。記法は次のとおり:
//!
//! ```text
//! fn メソッド名 => コマンド(位置引数, ...; ..可変長引数);
//! ```
//!
//! 可変長引数は末尾に 1 つだけ置ける。キーワード的なオプションを持つコマンドや、
//! 可変長引数の後ろに引数が続くコマンド（`BLPOP` など）は手書きしている。
//!
//! Rust の予約語と衝突する `MOVE` / `TYPE` は `move_key` / `key_type` とした。

use redigate_domain::{
    argument::{CommandArg, ScoreRangeOptions, SortOptions, StoreSetOptions},
    command::Command,
};
use redis::Value;

use crate::{dispatcher::CommandDispatcher, error::InfraError};

/// ラッパーが受け付ける引数
///
/// [`CommandArg`] に変換できる型（文字列・整数・浮動小数点数・バイト列・オプション列挙）。
pub trait Arg: Into<CommandArg> + Send {}

impl<T: Into<CommandArg> + Send> Arg for T {}

macro_rules! commands {
    ($(
        $(#[$meta:meta])*
        fn $method:ident => $command:ident($($arg:ident),* $(; ..$rest:ident)?);
    )*) => {
        impl CommandDispatcher {
            $(
                $(#[$meta])*
                pub async fn $method(
                    &self,
                    $($arg: impl Arg,)*
                    $($rest: impl IntoIterator<Item = impl Arg> + Send,)?
                ) -> Result<Value, InfraError> {
                    #[allow(unused_mut)]
                    let mut args: Vec<CommandArg> = vec![$($arg.into()),*];
                    $(args.extend($rest.into_iter().map(Into::into));)?
                    self.execute(Command::$command, args).await
                }
            )*
        }
    };
}

// ===== キー =====

commands! {
    fn del => Del(; ..keys);
    fn dump => Dump(key);
    fn exists => Exists(key);
    fn expire => Expire(key, seconds);
    fn expireat => ExpireAt(key, timestamp);
    fn keys => Keys(pattern);
    fn migrate => Migrate(host, port, key, destination_db, timeout);
    /// `MOVE key db`
    fn move_key => Move(key, db);
    /// `OBJECT subcommand key`（`ENCODING` / `REFCOUNT` / `IDLETIME`）
    fn object => Object(subcommand, key);
    fn persist => Persist(key);
    fn pexpire => PExpire(key, milliseconds);
    fn pexpireat => PExpireAt(key, timestamp);
    fn pttl => PTtl(key);
    fn randomkey => RandomKey();
    fn rename => Rename(key, new_key);
    fn renamenx => RenameNx(key, new_key);
    fn restore => Restore(key, ttl, serialized_value);
    fn ttl => Ttl(key);
    /// `TYPE key`
    fn key_type => Type(key);
}

// ===== 文字列 =====

commands! {
    fn append => Append(key, value);
    /// `BITCOUNT key [start end]`
    fn bitcount => BitCount(key; ..range);
    /// `BITOP operation destkey key [key ...]`
    fn bitop => BitOp(operation, destination; ..keys);
    fn decr => Decr(key);
    fn decrby => DecrBy(key, decrement);
    fn get => Get(key);
    fn getbit => GetBit(key, offset);
    fn getrange => GetRange(key, start, end);
    fn getset => GetSet(key, value);
    fn incr => Incr(key);
    fn incrby => IncrBy(key, increment);
    fn incrbyfloat => IncrByFloat(key, increment);
    fn mget => MGet(; ..keys);
    fn psetex => PSetEx(key, milliseconds, value);
    fn set => Set(key, value);
    fn setbit => SetBit(key, offset, value);
    fn setex => SetEx(key, seconds, value);
    fn setnx => SetNx(key, value);
    fn setrange => SetRange(key, offset, value);
    fn strlen => StrLen(key);
}

// ===== ハッシュ =====

commands! {
    fn hdel => HDel(key; ..fields);
    fn hexists => HExists(key, field);
    fn hget => HGet(key, field);
    fn hgetall => HGetAll(key);
    fn hincrby => HIncrBy(key, field, increment);
    fn hincrbyfloat => HIncrByFloat(key, field, increment);
    fn hkeys => HKeys(key);
    fn hlen => HLen(key);
    fn hmget => HMGet(key; ..fields);
    fn hset => HSet(key, field, value);
    fn hsetnx => HSetNx(key, field, value);
    fn hvals => HVals(key);
}

// ===== リスト =====

commands! {
    /// 要素が届くまで接続をブロックする。共有接続上の他の呼び出しも待たされる
    fn brpoplpush => BRPopLPush(source, destination, timeout);
    fn lindex => LIndex(key, index);
    /// `LINSERT key BEFORE|AFTER pivot value`
    fn linsert => LInsert(key, position, pivot, value);
    fn llen => LLen(key);
    fn lpop => LPop(key);
    fn lpush => LPush(key; ..values);
    fn lpushx => LPushX(key, value);
    fn lrange => LRange(key, start, stop);
    fn lrem => LRem(key, count, value);
    fn lset => LSet(key, index, value);
    fn ltrim => LTrim(key, start, stop);
    fn rpop => RPop(key);
    fn rpoplpush => RPopLPush(source, destination);
    fn rpush => RPush(key; ..values);
    fn rpushx => RPushX(key, value);
}

// ===== セット =====

commands! {
    fn sadd => SAdd(key; ..members);
    fn scard => SCard(key);
    fn sdiff => SDiff(; ..keys);
    fn sdiffstore => SDiffStore(destination; ..keys);
    fn sinter => SInter(; ..keys);
    fn sinterstore => SInterStore(destination; ..keys);
    fn sismember => SIsMember(key, member);
    fn smembers => SMembers(key);
    fn smove => SMove(source, destination, member);
    fn spop => SPop(key);
    fn srandmember => SRandMember(key);
    fn srem => SRem(key; ..members);
    fn sunion => SUnion(; ..keys);
    fn sunionstore => SUnionStore(destination; ..keys);
}

// ===== ソート済みセット =====

commands! {
    fn zcard => ZCard(key);
    fn zcount => ZCount(key, min, max);
    fn zincrby => ZIncrBy(key, increment, member);
    fn zrank => ZRank(key, member);
    fn zrem => ZRem(key; ..members);
    fn zremrangebyrank => ZRemRangeByRank(key, start, stop);
    fn zremrangebyscore => ZRemRangeByScore(key, min, max);
    fn zrevrank => ZRevRank(key, member);
    fn zscore => ZScore(key, member);
}

// ===== スクリプト・Pub/Sub・トランザクション・接続 =====

commands! {
    fn script_exists => ScriptExists(; ..sha1s);
    fn script_flush => ScriptFlush();
    fn script_kill => ScriptKill();
    fn script_load => ScriptLoad(script);

    fn publish => Publish(channel, message);

    /// 共有接続上のトランザクションは、他の呼び出し元のコマンドと混ざりうる
    fn multi => Multi();
    fn exec => Exec();
    fn discard => Discard();
    fn watch => Watch(; ..keys);
    fn unwatch => Unwatch();

    fn ping => Ping();
    fn echo => Echo(message);
}

// ===== 手書きのラッパー =====

fn collect<A: Arg>(values: impl IntoIterator<Item = A>) -> Vec<CommandArg> {
    values.into_iter().map(Into::into).collect()
}

fn flatten_pairs<K: Arg, V: Arg>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<CommandArg> {
    pairs
        .into_iter()
        .flat_map(|(k, v)| [k.into(), v.into()])
        .collect()
}

/// `script numkeys key ... arg ...` を組み立てる
fn script_args(script: CommandArg, keys: Vec<CommandArg>, args: Vec<CommandArg>) -> Vec<CommandArg> {
    let numkeys = i64::try_from(keys.len()).unwrap_or(i64::MAX);
    let mut out = Vec::with_capacity(keys.len() + args.len() + 2);
    out.push(script);
    out.push(numkeys.into());
    out.extend(keys);
    out.extend(args);
    out
}

impl CommandDispatcher {
    /// `SORT key [BY ...] [LIMIT ...] [GET ...] [DESC] [ALPHA] [STORE ...]`
    pub async fn sort(&self, key: impl Arg, options: &SortOptions) -> Result<Value, InfraError> {
        let mut args = vec![key.into()];
        args.extend(options.to_args());
        self.execute(Command::Sort, args).await
    }

    /// `MSET key value [key value ...]`
    pub async fn mset<K: Arg, V: Arg>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)> + Send,
    ) -> Result<Value, InfraError> {
        self.execute(Command::MSet, flatten_pairs(pairs)).await
    }

    pub async fn msetnx<K: Arg, V: Arg>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)> + Send,
    ) -> Result<Value, InfraError> {
        self.execute(Command::MSetNx, flatten_pairs(pairs)).await
    }

    /// `HMSET key field value [field value ...]`
    pub async fn hmset<F: Arg, V: Arg>(
        &self,
        key: impl Arg,
        pairs: impl IntoIterator<Item = (F, V)> + Send,
    ) -> Result<Value, InfraError> {
        let mut args = vec![key.into()];
        args.extend(flatten_pairs(pairs));
        self.execute(Command::HMSet, args).await
    }

    /// `BLPOP key [key ...] timeout`
    pub async fn blpop<K: Arg>(
        &self,
        keys: impl IntoIterator<Item = K> + Send,
        timeout: impl Arg,
    ) -> Result<Value, InfraError> {
        let mut args = collect(keys);
        args.push(timeout.into());
        self.execute(Command::BLPop, args).await
    }

    /// `BRPOP key [key ...] timeout`
    pub async fn brpop<K: Arg>(
        &self,
        keys: impl IntoIterator<Item = K> + Send,
        timeout: impl Arg,
    ) -> Result<Value, InfraError> {
        let mut args = collect(keys);
        args.push(timeout.into());
        self.execute(Command::BRPop, args).await
    }

    /// `ZADD key score member [score member ...]`
    pub async fn zadd<M: Arg>(
        &self,
        key: impl Arg,
        members: impl IntoIterator<Item = (f64, M)> + Send,
    ) -> Result<Value, InfraError> {
        let mut args = vec![key.into()];
        args.extend(flatten_pairs(members));
        self.execute(Command::ZAdd, args).await
    }

    /// `ZRANGE key start stop [WITHSCORES]`
    pub async fn zrange(
        &self,
        key: impl Arg,
        start: i64,
        stop: i64,
        with_scores: bool,
    ) -> Result<Value, InfraError> {
        self.execute(Command::ZRange, range_args(key.into(), start, stop, with_scores))
            .await
    }

    pub async fn zrevrange(
        &self,
        key: impl Arg,
        start: i64,
        stop: i64,
        with_scores: bool,
    ) -> Result<Value, InfraError> {
        self.execute(Command::ZRevRange, range_args(key.into(), start, stop, with_scores))
            .await
    }

    /// `ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count]`
    ///
    /// `min` / `max` には `"(1"` や `"-inf"` のような排他・無限の指定も渡せる。
    pub async fn zrangebyscore(
        &self,
        key: impl Arg,
        min: impl Arg,
        max: impl Arg,
        options: ScoreRangeOptions,
    ) -> Result<Value, InfraError> {
        let mut args = vec![key.into(), min.into(), max.into()];
        args.extend(options.to_args());
        self.execute(Command::ZRangeByScore, args).await
    }

    /// `ZREVRANGEBYSCORE key max min [WITHSCORES] [LIMIT offset count]`
    pub async fn zrevrangebyscore(
        &self,
        key: impl Arg,
        max: impl Arg,
        min: impl Arg,
        options: ScoreRangeOptions,
    ) -> Result<Value, InfraError> {
        let mut args = vec![key.into(), max.into(), min.into()];
        args.extend(options.to_args());
        self.execute(Command::ZRevRangeByScore, args).await
    }

    /// `ZINTERSTORE destination numkeys key [key ...] [WEIGHTS ...] [AGGREGATE ...]`
    pub async fn zinterstore<K: Arg>(
        &self,
        destination: impl Arg,
        keys: impl IntoIterator<Item = K> + Send,
        options: &StoreSetOptions,
    ) -> Result<Value, InfraError> {
        let args = options.to_args(destination.into(), collect(keys));
        self.execute(Command::ZInterStore, args).await
    }

    pub async fn zunionstore<K: Arg>(
        &self,
        destination: impl Arg,
        keys: impl IntoIterator<Item = K> + Send,
        options: &StoreSetOptions,
    ) -> Result<Value, InfraError> {
        let args = options.to_args(destination.into(), collect(keys));
        self.execute(Command::ZUnionStore, args).await
    }

    /// `EVAL script numkeys key [key ...] arg [arg ...]`
    ///
    /// `numkeys` はキーの数から導出する。
    pub async fn eval<K: Arg, A: Arg>(
        &self,
        script: impl Arg,
        keys: impl IntoIterator<Item = K> + Send,
        args: impl IntoIterator<Item = A> + Send,
    ) -> Result<Value, InfraError> {
        let args = script_args(script.into(), collect(keys), collect(args));
        self.execute(Command::Eval, args).await
    }

    pub async fn evalsha<K: Arg, A: Arg>(
        &self,
        sha1: impl Arg,
        keys: impl IntoIterator<Item = K> + Send,
        args: impl IntoIterator<Item = A> + Send,
    ) -> Result<Value, InfraError> {
        let args = script_args(sha1.into(), collect(keys), collect(args));
        self.execute(Command::EvalSha, args).await
    }
}

fn range_args(key: CommandArg, start: i64, stop: i64, with_scores: bool) -> Vec<CommandArg> {
    let mut args = vec![key, start.into(), stop.into()];
    if with_scores {
        args.push("WITHSCORES".into());
    }
    args
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use redigate_domain::argument::{Aggregate, InsertPosition, Limit};

    use super::*;
    use crate::{ConnectionRegistry, mock::MockConnector};

    fn setup() -> (Arc<MockConnector>, CommandDispatcher) {
        let connector = Arc::new(MockConnector::new());
        let registry = Arc::new(ConnectionRegistry::new(connector.clone()));
        (connector, CommandDispatcher::new(registry))
    }

    /// 最後に届いた呼び出しのコマンド名と引数
    fn last_sent(connector: &MockConnector) -> (Command, Vec<CommandArg>) {
        connector
            .last_transport()
            .unwrap()
            .observed()
            .pop()
            .unwrap()
            .into_parts()
    }

    fn strs(values: &[&str]) -> Vec<CommandArg> {
        values.iter().map(|v| CommandArg::from(*v)).collect()
    }

    #[tokio::test]
    async fn test_ラッパー経由でsetとgetができる() {
        let (_, redis) = setup();

        redis.set("greeting", "hello").await.unwrap();
        let value = redis.get("greeting").await.unwrap();

        assert_eq!(value, Value::BulkString(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_可変長引数は位置引数の後ろに並ぶ() {
        let (connector, redis) = setup();

        redis.rpush("queue", ["a", "b", "c"]).await.unwrap();

        assert_eq!(
            last_sent(&connector),
            (Command::RPush, strs(&["queue", "a", "b", "c"]))
        );
    }

    #[tokio::test]
    async fn test_整数引数はそのまま転送される() {
        let (connector, redis) = setup();

        let _ = redis.expire("session", 3600).await;

        assert_eq!(
            last_sent(&connector),
            (Command::Expire, vec![CommandArg::from("session"), CommandArg::Int(3600)])
        );
    }

    #[tokio::test]
    async fn test_予約語と衝突するコマンドも転送できる() {
        let (connector, redis) = setup();

        let _ = redis.key_type("k").await;
        assert_eq!(last_sent(&connector).0, Command::Type);

        let _ = redis.move_key("k", 1).await;
        assert_eq!(last_sent(&connector).0, Command::Move);
    }

    #[tokio::test]
    async fn test_linsertは挿入位置をトークンで送る() {
        let (connector, redis) = setup();

        let _ = redis.linsert("queue", InsertPosition::After, "a", "b").await;

        assert_eq!(
            last_sent(&connector),
            (Command::LInsert, strs(&["queue", "AFTER", "a", "b"]))
        );
    }

    #[tokio::test]
    async fn test_msetはキーと値を交互に並べる() {
        let (connector, redis) = setup();

        let _ = redis.mset([("a", "1"), ("b", "2")]).await;

        assert_eq!(last_sent(&connector), (Command::MSet, strs(&["a", "1", "b", "2"])));
    }

    #[tokio::test]
    async fn test_blpopはタイムアウトを末尾に置く() {
        let (connector, redis) = setup();

        let _ = redis.blpop(["q1", "q2"], 5).await;

        let mut expected = strs(&["q1", "q2"]);
        expected.push(CommandArg::Int(5));
        assert_eq!(last_sent(&connector), (Command::BLPop, expected));
    }

    #[tokio::test]
    async fn test_sortはオプションをキーの後ろに展開する() {
        let (connector, redis) = setup();
        let options = SortOptions {
            limit: Some(Limit::new(0, 5)),
            alpha: true,
            ..Default::default()
        };

        let _ = redis.sort("names", &options).await;

        let mut expected = strs(&["names", "LIMIT"]);
        expected.extend([CommandArg::Int(0), CommandArg::Int(5), "ALPHA".into()]);
        assert_eq!(last_sent(&connector), (Command::Sort, expected));
    }

    #[tokio::test]
    async fn test_zrangeのwithscores指定() {
        let (connector, redis) = setup();

        let _ = redis.zrange("board", 0, -1, true).await;

        assert_eq!(
            last_sent(&connector),
            (Command::ZRange, vec![
                "board".into(),
                CommandArg::Int(0),
                CommandArg::Int(-1),
                "WITHSCORES".into(),
            ])
        );
    }

    #[tokio::test]
    async fn test_zunionstoreはnumkeysと集約方法を送る() {
        let (connector, redis) = setup();
        let options = StoreSetOptions {
            weights:   Vec::new(),
            aggregate: Some(Aggregate::Max),
        };

        let _ = redis.zunionstore("out", ["a", "b"], &options).await;

        assert_eq!(
            last_sent(&connector),
            (Command::ZUnionStore, vec![
                "out".into(),
                CommandArg::Int(2),
                "a".into(),
                "b".into(),
                "AGGREGATE".into(),
                "MAX".into(),
            ])
        );
    }

    #[tokio::test]
    async fn test_evalはキーの数を導出する() {
        let (connector, redis) = setup();

        let _ = redis
            .eval("return redis.call('GET', KEYS[1])", ["k"], ["x", "y"])
            .await;

        assert_eq!(
            last_sent(&connector),
            (Command::Eval, vec![
                "return redis.call('GET', KEYS[1])".into(),
                CommandArg::Int(1),
                "k".into(),
                "x".into(),
                "y".into(),
            ])
        );
    }

    #[tokio::test]
    async fn test_引数なしのコマンド() {
        let (connector, redis) = setup();

        let pong = redis.ping().await.unwrap();

        assert_eq!(pong, Value::SimpleString("PONG".to_string()));
        assert_eq!(last_sent(&connector), (Command::Ping, Vec::new()));
    }

    #[tokio::test]
    async fn test_zrangebyscoreは範囲の後ろにオプションを置く() {
        let (connector, redis) = setup();
        let options = ScoreRangeOptions {
            with_scores: true,
            limit:       None,
        };

        let _ = redis.zrangebyscore("board", "(1", "+inf", options).await;

        assert_eq!(
            last_sent(&connector),
            (Command::ZRangeByScore, strs(&["board", "(1", "+inf", "WITHSCORES"]))
        );
    }
}
