//! # テスト用インメモリ実装
//!
//! Redis サーバーなしでレジストリとディスパッチャを検証するための
//! [`Connector`] / [`Transport`] 実装。
//!
//! - [`MockConnector`]: 接続の確立回数を数え、失敗や遅延を注入できる
//! - [`MockTransport`]: 受け取ったコマンドを記録し、一部のコマンドを
//!   インメモリのストアで処理する。切断状態にもできる
//!
//! 同じ [`MockConnector`] から作った接続同士は `PUBLISH` と購読を共有する
//! （[`MockSubscriber`]）。
//!
//! 対応していないコマンドはストアのエラー応答（`ERR unknown command`）を返す。
//! `EXEC` はキューのいずれかが失敗するとそのエラーを返す点で実物と異なる。

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use redigate_domain::{
    command::{Command, CommandInvocation},
    service::ServiceName,
    settings::ConnectionSettings,
};
use redis::Value;

use crate::{
    connection::{Connector, Subscriber, Transport},
    error::InfraError,
    subscription::PubSubMessage,
};

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MockConnector
// =============================================================================

/// 接続の確立を記録する [`Connector`]
#[derive(Debug, Default)]
pub struct MockConnector {
    connect_count: AtomicUsize,
    failing:       AtomicBool,
    connect_delay: Option<Duration>,
    subscribers:   AtomicUsize,
    connected:     Mutex<Vec<ConnectionSettings>>,
    transports:    Mutex<Vec<Arc<MockTransport>>>,
    hub:           Arc<PubSubHub>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続の確立に時間がかかる状況を再現する
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// `true` の間、接続の確立は常に失敗する
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 接続の確立を試みた回数（失敗を含む）
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// 購読用の専用接続を確立した回数
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// 確立に成功した接続の設定（確立順）
    pub fn connected_settings(&self) -> Vec<ConnectionSettings> {
        lock(&self.connected).clone()
    }

    /// 確立したトランスポート（確立順）
    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        lock(&self.transports).clone()
    }

    /// 最後に確立したトランスポート
    pub fn last_transport(&self) -> Option<Arc<MockTransport>> {
        lock(&self.transports).last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        service: &ServiceName,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn Transport>, InfraError> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.refuse_if_failing(service)?;

        lock(&self.connected).push(settings.clone());
        let transport = Arc::new(MockTransport::with_hub(Arc::clone(&self.hub)));
        lock(&self.transports).push(Arc::clone(&transport));
        Ok(transport as Arc<dyn Transport>)
    }

    async fn subscriber(
        &self,
        service: &ServiceName,
        _settings: &ConnectionSettings,
    ) -> Result<Box<dyn Subscriber>, InfraError> {
        self.refuse_if_failing(service)?;

        self.subscribers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.hub.register()))
    }
}

impl MockConnector {
    fn refuse_if_failing(&self, service: &ServiceName) -> Result<(), InfraError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InfraError::connection(
                service.as_str(),
                (redis::ErrorKind::Io, "Connection refused").into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Pub/Sub
// =============================================================================

#[derive(Debug, Default)]
struct Topics {
    channels: BTreeSet<String>,
    patterns: BTreeSet<String>,
}

#[derive(Debug)]
struct HubEntry {
    topics: Arc<Mutex<Topics>>,
    sender: mpsc::UnboundedSender<PubSubMessage>,
}

/// 購読者の一覧。`PUBLISH` の配送先を決める
#[derive(Debug, Default)]
struct PubSubHub {
    entries: Mutex<Vec<HubEntry>>,
}

impl PubSubHub {
    fn register(&self) -> MockSubscriber {
        let (sender, receiver) = mpsc::unbounded_channel();
        let topics = Arc::new(Mutex::new(Topics::default()));
        lock(&self.entries).push(HubEntry {
            topics: Arc::clone(&topics),
            sender,
        });
        MockSubscriber { topics, receiver }
    }

    /// 配送した購読の数を返す
    fn publish(&self, channel: &str, payload: &[u8]) -> usize {
        let mut entries = lock(&self.entries);
        entries.retain(|entry| !entry.sender.is_closed());

        let mut delivered = 0;
        for entry in entries.iter() {
            let topics = lock(&entry.topics);
            let direct = topics.channels.contains(channel).then_some(None);
            let matched = topics
                .patterns
                .iter()
                .filter(|pattern| glob_match(pattern.as_bytes(), channel.as_bytes()))
                .map(|pattern| Some(pattern.clone()));

            for pattern in direct.into_iter().chain(matched) {
                let message = PubSubMessage::new(channel.to_owned(), pattern, payload.to_vec());
                if entry.sender.send(message).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

/// `*` と `?` のみ対応する glob
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.split_first(), text.split_first()) {
        (None, None) => true,
        (Some((b'*', rest)), _) => {
            glob_match(rest, text) || text.split_first().is_some_and(|(_, tail)| glob_match(pattern, tail))
        }
        (Some((b'?', rest)), Some((_, tail))) => glob_match(rest, tail),
        (Some((p, rest)), Some((t, tail))) if p == t => glob_match(rest, tail),
        _ => false,
    }
}

/// インメモリの購読接続
#[derive(Debug)]
pub struct MockSubscriber {
    topics:   Arc<Mutex<Topics>>,
    receiver: mpsc::UnboundedReceiver<PubSubMessage>,
}

#[async_trait]
impl Subscriber for MockSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), InfraError> {
        lock(&self.topics).channels.insert(channel.to_owned());
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), InfraError> {
        lock(&self.topics).channels.remove(channel);
        Ok(())
    }

    async fn psubscribe(&mut self, pattern: &str) -> Result<(), InfraError> {
        lock(&self.topics).patterns.insert(pattern.to_owned());
        Ok(())
    }

    async fn punsubscribe(&mut self, pattern: &str) -> Result<(), InfraError> {
        lock(&self.topics).patterns.remove(pattern);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<PubSubMessage> {
        self.receiver.recv().await
    }
}

// =============================================================================
// MockTransport
// =============================================================================

#[derive(Debug, Clone)]
enum Entry {
    Str(Vec<u8>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
}

type Store = HashMap<Vec<u8>, Entry>;

/// コマンドを記録し、インメモリで応答する [`Transport`]
#[derive(Debug, Default)]
pub struct MockTransport {
    observed: Mutex<Vec<CommandInvocation>>,
    queue:    Mutex<Option<Vec<CommandInvocation>>>,
    store:    Mutex<Store>,
    severed:  AtomicBool,
    hub:      Arc<PubSubHub>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_hub(hub: Arc<PubSubHub>) -> Self {
        Self {
            hub,
            ..Self::default()
        }
    }

    fn publish(&self, invocation: &CommandInvocation) -> Result<Value, InfraError> {
        let channel = String::from_utf8_lossy(&arg(invocation, 0)?).into_owned();
        let payload = arg(invocation, 1)?;
        Ok(len_value(self.hub.publish(&channel, &payload)))
    }

    /// 接続を切断した状態にする
    ///
    /// 以降の送信はすべて転送エラーになる。
    pub fn sever(&self) {
        self.severed.store(true, Ordering::SeqCst);
    }

    pub fn is_severed(&self) -> bool {
        self.severed.load(Ordering::SeqCst)
    }

    /// ストアに届いた呼び出し（到着順）
    pub fn observed(&self) -> Vec<CommandInvocation> {
        lock(&self.observed).clone()
    }

    /// ストアに届いたコマンド（到着順）
    pub fn observed_commands(&self) -> Vec<Command> {
        lock(&self.observed)
            .iter()
            .map(CommandInvocation::command)
            .collect()
    }

    fn apply(&self, invocation: &CommandInvocation) -> Result<Value, InfraError> {
        let mut queue = lock(&self.queue);
        match invocation.command() {
            Command::Multi => {
                if queue.is_some() {
                    return Err(reply_error(invocation, "ERR MULTI calls can not be nested"));
                }
                *queue = Some(Vec::new());
                Ok(Value::Okay)
            }
            Command::Exec => {
                let queued = queue
                    .take()
                    .ok_or_else(|| reply_error(invocation, "ERR EXEC without MULTI"))?;
                let mut store = lock(&self.store);
                queued
                    .iter()
                    .map(|queued| execute(&mut store, queued))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Command::Discard => {
                queue
                    .take()
                    .ok_or_else(|| reply_error(invocation, "ERR DISCARD without MULTI"))?;
                Ok(Value::Okay)
            }
            Command::Watch | Command::Unwatch => Ok(Value::Okay),
            _ => match queue.as_mut() {
                Some(queued) => {
                    queued.push(invocation.clone());
                    Ok(Value::SimpleString("QUEUED".to_string()))
                }
                None if invocation.command() == Command::Publish => self.publish(invocation),
                None => execute(&mut lock(&self.store), invocation),
            },
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, invocation: &CommandInvocation) -> Result<Value, InfraError> {
        tokio::task::yield_now().await;

        if self.is_severed() {
            return Err(InfraError::command(
                invocation.command().name(),
                (redis::ErrorKind::Io, "Connection reset by peer").into(),
            ));
        }

        lock(&self.observed).push(invocation.clone());
        self.apply(invocation)
    }
}

// =============================================================================
// コマンドの処理
// =============================================================================

fn reply_error(invocation: &CommandInvocation, message: impl Into<String>) -> InfraError {
    InfraError::store_reported(invocation.command().name(), message)
}

fn wrong_arity(invocation: &CommandInvocation) -> InfraError {
    reply_error(
        invocation,
        format!(
            "ERR wrong number of arguments for '{}' command",
            invocation.command().name().to_ascii_lowercase()
        ),
    )
}

fn not_integer(invocation: &CommandInvocation) -> InfraError {
    reply_error(invocation, "ERR value is not an integer or out of range")
}

fn arg(invocation: &CommandInvocation, index: usize) -> Result<Vec<u8>, InfraError> {
    invocation
        .args()
        .get(index)
        .map(|a| a.as_bytes().into_owned())
        .ok_or_else(|| wrong_arity(invocation))
}

fn parse_int(invocation: &CommandInvocation, bytes: &[u8]) -> Result<i64, InfraError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| not_integer(invocation))
}

fn int_arg(invocation: &CommandInvocation, index: usize) -> Result<i64, InfraError> {
    parse_int(invocation, &arg(invocation, index)?)
}

/// 先頭を除いた引数（キーに続く値の列）
fn rest(invocation: &CommandInvocation, from: usize) -> Result<Vec<Vec<u8>>, InfraError> {
    let rest: Vec<_> = invocation
        .args()
        .iter()
        .skip(from)
        .map(|a| a.as_bytes().into_owned())
        .collect();
    if rest.is_empty() {
        return Err(wrong_arity(invocation));
    }
    Ok(rest)
}

fn len_value(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

fn bulk(bytes: Vec<u8>) -> Value {
    Value::BulkString(bytes)
}

/// `LRANGE` の添字を 0 始まりの閉区間に正規化する
fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn execute(store: &mut Store, invocation: &CommandInvocation) -> Result<Value, InfraError> {
    let wrong_type = || reply_error(invocation, WRONGTYPE);

    match invocation.command() {
        Command::Ping => match invocation.args().first() {
            Some(message) => Ok(bulk(message.as_bytes().into_owned())),
            None => Ok(Value::SimpleString("PONG".to_string())),
        },
        Command::Echo => Ok(bulk(arg(invocation, 0)?)),

        Command::Get => match store.get(&arg(invocation, 0)?) {
            Some(Entry::Str(value)) => Ok(bulk(value.clone())),
            Some(_) => Err(wrong_type()),
            None => Ok(Value::Nil),
        },
        Command::Set => {
            store.insert(arg(invocation, 0)?, Entry::Str(arg(invocation, 1)?));
            Ok(Value::Okay)
        }
        Command::Del => {
            let removed = rest(invocation, 0)?
                .iter()
                .filter(|key| store.remove(*key).is_some())
                .count();
            Ok(len_value(removed))
        }
        Command::Exists => {
            let found = rest(invocation, 0)?
                .iter()
                .filter(|key| store.contains_key(*key))
                .count();
            Ok(len_value(found))
        }
        Command::Incr | Command::Decr | Command::IncrBy | Command::DecrBy => {
            let key = arg(invocation, 0)?;
            let delta = match invocation.command() {
                Command::Incr => 1,
                Command::Decr => -1,
                Command::IncrBy => int_arg(invocation, 1)?,
                _ => int_arg(invocation, 1)?.checked_neg().ok_or_else(|| not_integer(invocation))?,
            };
            let current = match store.get(&key) {
                Some(Entry::Str(value)) => parse_int(invocation, value)?,
                Some(_) => return Err(wrong_type()),
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| reply_error(invocation, "ERR increment or decrement would overflow"))?;
            store.insert(key, Entry::Str(next.to_string().into_bytes()));
            Ok(Value::Int(next))
        }
        Command::Append => {
            let key = arg(invocation, 0)?;
            let suffix = arg(invocation, 1)?;
            match store.entry(key).or_insert_with(|| Entry::Str(Vec::new())) {
                Entry::Str(value) => {
                    value.extend_from_slice(&suffix);
                    Ok(len_value(value.len()))
                }
                _ => Err(wrong_type()),
            }
        }
        Command::StrLen => match store.get(&arg(invocation, 0)?) {
            Some(Entry::Str(value)) => Ok(len_value(value.len())),
            Some(_) => Err(wrong_type()),
            None => Ok(Value::Int(0)),
        },

        Command::HSet => {
            let key = arg(invocation, 0)?;
            let pairs = rest(invocation, 1)?;
            if pairs.len() % 2 != 0 {
                return Err(wrong_arity(invocation));
            }
            match store.entry(key).or_insert_with(|| Entry::Hash(BTreeMap::new())) {
                Entry::Hash(hash) => {
                    let added = pairs
                        .chunks_exact(2)
                        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                        .count();
                    Ok(len_value(added))
                }
                _ => Err(wrong_type()),
            }
        }
        Command::HGet => match store.get(&arg(invocation, 0)?) {
            Some(Entry::Hash(hash)) => Ok(hash
                .get(&arg(invocation, 1)?)
                .cloned()
                .map_or(Value::Nil, bulk)),
            Some(_) => Err(wrong_type()),
            None => Ok(Value::Nil),
        },
        Command::HGetAll => match store.get(&arg(invocation, 0)?) {
            Some(Entry::Hash(hash)) => Ok(Value::Array(
                hash.iter()
                    .flat_map(|(field, value)| [bulk(field.clone()), bulk(value.clone())])
                    .collect(),
            )),
            Some(_) => Err(wrong_type()),
            None => Ok(Value::Array(Vec::new())),
        },

        Command::LPush | Command::RPush => {
            let key = arg(invocation, 0)?;
            let values = rest(invocation, 1)?;
            let front = invocation.command() == Command::LPush;
            match store.entry(key).or_insert_with(|| Entry::List(VecDeque::new())) {
                Entry::List(list) => {
                    for value in values {
                        if front {
                            list.push_front(value);
                        } else {
                            list.push_back(value);
                        }
                    }
                    Ok(len_value(list.len()))
                }
                _ => Err(wrong_type()),
            }
        }
        Command::LRange => {
            let key = arg(invocation, 0)?;
            let start = int_arg(invocation, 1)?;
            let stop = int_arg(invocation, 2)?;
            match store.get(&key) {
                Some(Entry::List(list)) => Ok(Value::Array(
                    normalize_range(start, stop, list.len())
                        .map(|(start, stop)| {
                            list.range(start..=stop).cloned().map(bulk).collect()
                        })
                        .unwrap_or_default(),
                )),
                Some(_) => Err(wrong_type()),
                None => Ok(Value::Array(Vec::new())),
            }
        }

        Command::SAdd => {
            let key = arg(invocation, 0)?;
            let members = rest(invocation, 1)?;
            match store.entry(key).or_insert_with(|| Entry::Set(BTreeSet::new())) {
                Entry::Set(set) => {
                    let added = members.into_iter().filter(|m| set.insert(m.clone())).count();
                    Ok(len_value(added))
                }
                _ => Err(wrong_type()),
            }
        }
        Command::SMembers => match store.get(&arg(invocation, 0)?) {
            Some(Entry::Set(set)) => Ok(Value::Array(set.iter().cloned().map(bulk).collect())),
            Some(_) => Err(wrong_type()),
            None => Ok(Value::Array(Vec::new())),
        },

        other => Err(reply_error(
            invocation,
            format!("ERR unknown command '{}'", other.name()),
        )),
    }
}
