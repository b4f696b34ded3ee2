//! An in-process mock server for exercising the client end-to-end.
//!
//! Speaks enough of the protocol to run every scenario the crate's tests
//! care about: string/list/hash commands, MULTI/EXEC queueing with WATCH
//! dirty-tracking, blocking pops, and pub/sub fan-out across connections.
//! Nothing here aims for production fidelity — single mutex, polling
//! blocking ops, no expiry.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::codec::{self, Reply};
use crate::config::{ConnectionInfo, Endpoint};

const REQUEST_CAP: usize = 8 * 1024 * 1024;
const BLOCK_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
enum Value {
    Str(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
        }
    }
}

#[derive(Default)]
struct Db {
    entries: HashMap<Vec<u8>, Value>,
    versions: HashMap<Vec<u8>, u64>,
    tick: u64,
}

impl Db {
    fn bump(&mut self, key: &[u8]) {
        self.tick += 1;
        self.versions.insert(key.to_vec(), self.tick);
    }

    fn version(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

struct SubEntry {
    tx: UnboundedSender<Reply>,
    channels: HashSet<Vec<u8>>,
    patterns: HashSet<Vec<u8>>,
}

struct Shared {
    db: Mutex<Db>,
    subs: Mutex<HashMap<u64, SubEntry>>,
    accepted: AtomicUsize,
    next_id: AtomicU64,
}

/// One listening mock server. Dropping it stops the accept loop; live
/// per-connection tasks die with their sockets.
pub struct MockServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// Bind an ephemeral localhost port and start serving.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            db: Mutex::new(Db::default()),
            subs: Mutex::new(HashMap::new()),
            accepted: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        });
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));
        Ok(MockServer {
            addr,
            shared,
            accept_task,
        })
    }

    /// Where the server listens.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    /// Plain connection config for this server.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.endpoint())
    }

    /// How many connections have ever been accepted.
    pub fn accepted_connections(&self) -> usize {
        self.shared.accepted.load(Ordering::Relaxed)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let Ok((stream, peer)) = listener.accept().await else {
            return;
        };
        debug!(%peer, "mock server accepted");
        shared.accepted.fetch_add(1, Ordering::Relaxed);
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(serve(stream, Arc::clone(&shared), id));
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>, id: u64) {
    let _ = serve_inner(stream, Arc::clone(&shared), id).await;
    shared.subs.lock().unwrap().remove(&id);
}

async fn serve_inner(stream: TcpStream, shared: Arc<Shared>, id: u64) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        id,
        shared,
        push_tx,
        in_multi: false,
        queue_error: false,
        queued: Vec::new(),
        watches: HashMap::new(),
        quit: false,
    };
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        tokio::select! {
            Some(frame) = push_rx.recv() => {
                writer.write_all(&codec::encode_reply(&frame)).await?;
            }
            read = reader.read_buf(&mut buf) => {
                if read? == 0 {
                    return Ok(());
                }
                loop {
                    let Ok(decoded) = codec::decode(&buf, REQUEST_CAP) else {
                        return Ok(());
                    };
                    let Some((request, used)) = decoded else { break };
                    buf.advance(used);
                    let Some(args) = request_args(request) else {
                        return Ok(());
                    };
                    if args.is_empty() {
                        continue;
                    }
                    let name = String::from_utf8_lossy(&args[0]).to_uppercase();
                    let replies = if !session.in_multi && is_blocking(&name) {
                        vec![blocking_reply(&session.shared, &name, &args).await]
                    } else {
                        session.handle(&name, args)
                    };
                    for reply in &replies {
                        writer.write_all(&codec::encode_reply(reply)).await?;
                    }
                    if session.quit {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn request_args(request: Reply) -> Option<Vec<Vec<u8>>> {
    let Reply::Multi(Some(items)) = request else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Reply::Bulk(Some(bytes)) => Some(bytes),
            _ => None,
        })
        .collect()
}

fn is_blocking(name: &str) -> bool {
    matches!(name, "BLPOP" | "BRPOP" | "BRPOPLPUSH")
}

struct Session {
    id: u64,
    shared: Arc<Shared>,
    push_tx: UnboundedSender<Reply>,
    in_multi: bool,
    queue_error: bool,
    queued: Vec<Vec<Vec<u8>>>,
    watches: HashMap<Vec<u8>, u64>,
    quit: bool,
}

impl Session {
    fn handle(&mut self, name: &str, args: Vec<Vec<u8>>) -> Vec<Reply> {
        if self.in_multi && !matches!(name, "EXEC" | "DISCARD" | "MULTI" | "WATCH") {
            return if known_command(name) {
                self.queued.push(args);
                vec![simple("QUEUED")]
            } else {
                self.queue_error = true;
                vec![error("ERR unknown command")]
            };
        }
        match name {
            "MULTI" => {
                if self.in_multi {
                    return vec![error("ERR MULTI calls can not be nested")];
                }
                self.in_multi = true;
                vec![simple("OK")]
            }
            "EXEC" => vec![self.exec()],
            "DISCARD" => {
                if !self.in_multi {
                    return vec![error("ERR DISCARD without MULTI")];
                }
                self.in_multi = false;
                self.queue_error = false;
                self.queued.clear();
                self.watches.clear();
                vec![simple("OK")]
            }
            "WATCH" => {
                if self.in_multi {
                    return vec![error("ERR WATCH inside MULTI is not allowed")];
                }
                let db = self.shared.db.lock().unwrap();
                for key in &args[1..] {
                    self.watches.insert(key.clone(), db.version(key));
                }
                vec![simple("OK")]
            }
            "UNWATCH" => {
                self.watches.clear();
                vec![simple("OK")]
            }
            "SUBSCRIBE" => self.subscription(args, false, true),
            "PSUBSCRIBE" => self.subscription(args, true, true),
            "UNSUBSCRIBE" => self.subscription(args, false, false),
            "PUNSUBSCRIBE" => self.subscription(args, true, false),
            "PUBLISH" => vec![self.publish(&args)],
            "QUIT" => {
                self.quit = true;
                vec![simple("OK")]
            }
            _ => vec![run_data_command(&self.shared, name, &args)],
        }
    }

    fn exec(&mut self) -> Reply {
        if !self.in_multi {
            return error("ERR EXEC without MULTI");
        }
        self.in_multi = false;
        let queued = std::mem::take(&mut self.queued);
        let watches = std::mem::take(&mut self.watches);
        if std::mem::take(&mut self.queue_error) {
            return error("EXECABORT Transaction discarded because of previous errors.");
        }
        let dirty = {
            let db = self.shared.db.lock().unwrap();
            watches.iter().any(|(key, seen)| db.version(key) != *seen)
        };
        if dirty {
            return Reply::Multi(None);
        }
        let replies = queued
            .into_iter()
            .map(|args| {
                let name = String::from_utf8_lossy(&args[0]).to_uppercase();
                run_data_command(&self.shared, &name, &args)
            })
            .collect();
        Reply::Multi(Some(replies))
    }

    fn subscription(&mut self, args: Vec<Vec<u8>>, patterns: bool, add: bool) -> Vec<Reply> {
        let mut subs = self.shared.subs.lock().unwrap();
        let entry = subs.entry(self.id).or_insert_with(|| SubEntry {
            tx: self.push_tx.clone(),
            channels: HashSet::new(),
            patterns: HashSet::new(),
        });
        let (kind_add, kind_remove) = if patterns {
            ("psubscribe", "punsubscribe")
        } else {
            ("subscribe", "unsubscribe")
        };
        let mut replies = Vec::new();
        if add {
            for name in &args[1..] {
                if patterns {
                    entry.patterns.insert(name.clone());
                } else {
                    entry.channels.insert(name.clone());
                }
                let total = entry.channels.len() + entry.patterns.len();
                replies.push(ack(kind_add, Some(name.as_slice()), total as i64));
            }
        } else {
            let targets: Vec<Vec<u8>> = if args.len() > 1 {
                args[1..].to_vec()
            } else if patterns {
                entry.patterns.iter().cloned().collect()
            } else {
                entry.channels.iter().cloned().collect()
            };
            if targets.is_empty() {
                let total = entry.channels.len() + entry.patterns.len();
                replies.push(ack(kind_remove, None, total as i64));
            }
            for name in targets {
                if patterns {
                    entry.patterns.remove(&name);
                } else {
                    entry.channels.remove(&name);
                }
                let total = entry.channels.len() + entry.patterns.len();
                replies.push(ack(kind_remove, Some(name.as_slice()), total as i64));
            }
        }
        replies
    }

    fn publish(&self, args: &[Vec<u8>]) -> Reply {
        if args.len() != 3 {
            return error("ERR wrong number of arguments for 'publish' command");
        }
        let channel = &args[1];
        let payload = &args[2];
        let subs = self.shared.subs.lock().unwrap();
        let mut delivered = 0;
        for entry in subs.values() {
            if entry.channels.contains(channel) {
                let frame = Reply::Multi(Some(vec![
                    bulk(b"message"),
                    bulk(channel),
                    bulk(payload),
                ]));
                if entry.tx.send(frame).is_ok() {
                    delivered += 1;
                }
            }
            for pattern in &entry.patterns {
                if glob_match(pattern, channel) {
                    let frame = Reply::Multi(Some(vec![
                        bulk(b"pmessage"),
                        bulk(pattern),
                        bulk(channel),
                        bulk(payload),
                    ]));
                    if entry.tx.send(frame).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }
        Reply::Integer(delivered)
    }
}

async fn blocking_reply(shared: &Arc<Shared>, name: &str, args: &[Vec<u8>]) -> Reply {
    if args.len() < 3 {
        return error("ERR wrong number of arguments");
    }
    let Some(timeout_secs) = parse_i64(args.last().unwrap()) else {
        return error("ERR timeout is not an integer or out of range");
    };
    let deadline = if timeout_secs == 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_secs(timeout_secs as u64))
    };
    loop {
        let popped = {
            let mut db = shared.db.lock().unwrap();
            match name {
                "BLPOP" | "BRPOP" => {
                    let from_head = name == "BLPOP";
                    let mut hit = None;
                    for key in &args[1..args.len() - 1] {
                        if let Some(Value::List(list)) = db.entries.get_mut(key.as_slice()) {
                            let value = if from_head {
                                list.pop_front()
                            } else {
                                list.pop_back()
                            };
                            if let Some(value) = value {
                                db.bump(key);
                                hit = Some(Reply::Multi(Some(vec![bulk(key), bulk(&value)])));
                                break;
                            }
                        }
                    }
                    hit
                }
                _ => {
                    // BRPOPLPUSH source destination timeout
                    let source = args[1].clone();
                    let value = match db.entries.get_mut(source.as_slice()) {
                        Some(Value::List(list)) => list.pop_back(),
                        _ => None,
                    };
                    value.map(|value| {
                        db.bump(&source);
                        let destination = args[2].clone();
                        match db
                            .entries
                            .entry(destination.clone())
                            .or_insert_with(|| Value::List(VecDeque::new()))
                        {
                            Value::List(list) => list.push_front(value.clone()),
                            _ => return error("WRONGTYPE destination is not a list"),
                        }
                        db.bump(&destination);
                        bulk(&value)
                    })
                }
            }
        };
        if let Some(reply) = popped {
            return reply;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Reply::Multi(None);
            }
        }
        sleep(BLOCK_POLL).await;
    }
}

fn known_command(name: &str) -> bool {
    matches!(
        name,
        "PING"
            | "ECHO"
            | "AUTH"
            | "SELECT"
            | "SET"
            | "GET"
            | "GETSET"
            | "MGET"
            | "MSET"
            | "DEL"
            | "EXISTS"
            | "KEYS"
            | "TYPE"
            | "INCR"
            | "INCRBY"
            | "DECR"
            | "APPEND"
            | "STRLEN"
            | "LPUSH"
            | "RPUSH"
            | "LPOP"
            | "RPOP"
            | "LRANGE"
            | "LLEN"
            | "HSET"
            | "HGET"
            | "HDEL"
            | "HGETALL"
            | "FLUSHDB"
            | "DBSIZE"
            | "BLPOP"
            | "BRPOP"
            | "BRPOPLPUSH"
            | "PUBLISH"
    )
}

fn run_data_command(shared: &Arc<Shared>, name: &str, args: &[Vec<u8>]) -> Reply {
    let mut db = shared.db.lock().unwrap();
    match name {
        "PING" => simple("PONG"),
        "ECHO" => bulk(&args[1]),
        "AUTH" | "SELECT" => simple("OK"),
        "SET" => {
            db.entries
                .insert(args[1].clone(), Value::Str(args[2].clone()));
            db.bump(&args[1]);
            simple("OK")
        }
        "GET" => match db.entries.get(args[1].as_slice()) {
            None => Reply::Bulk(None),
            Some(Value::Str(value)) => bulk(value),
            Some(other) => wrongtype(other),
        },
        "GETSET" => {
            let old = match db.entries.get(args[1].as_slice()) {
                None => Reply::Bulk(None),
                Some(Value::Str(value)) => bulk(value),
                Some(other) => return wrongtype(other),
            };
            db.entries
                .insert(args[1].clone(), Value::Str(args[2].clone()));
            db.bump(&args[1]);
            old
        }
        "MGET" => Reply::Multi(Some(
            args[1..]
                .iter()
                .map(|key| match db.entries.get(key.as_slice()) {
                    Some(Value::Str(value)) => bulk(value),
                    _ => Reply::Bulk(None),
                })
                .collect(),
        )),
        "MSET" => {
            for pair in args[1..].chunks(2) {
                if let [key, value] = pair {
                    db.entries.insert(key.clone(), Value::Str(value.clone()));
                    db.bump(key);
                }
            }
            simple("OK")
        }
        "DEL" => {
            let mut removed = 0;
            for key in &args[1..] {
                if db.entries.remove(key.as_slice()).is_some() {
                    db.bump(key);
                    removed += 1;
                }
            }
            Reply::Integer(removed)
        }
        "EXISTS" => Reply::Integer(i64::from(db.entries.contains_key(args[1].as_slice()))),
        "KEYS" => Reply::Multi(Some(
            db.entries
                .keys()
                .filter(|key| glob_match(&args[1], key.as_slice()))
                .map(|key| bulk(key))
                .collect(),
        )),
        "TYPE" => simple(
            db.entries
                .get(args[1].as_slice())
                .map_or("none", Value::type_name),
        ),
        "INCR" | "INCRBY" | "DECR" => {
            let delta = match name {
                "INCR" => 1,
                "DECR" => -1,
                _ => match parse_i64(&args[2]) {
                    Some(delta) => delta,
                    None => return error("ERR value is not an integer or out of range"),
                },
            };
            let current = match db.entries.get(args[1].as_slice()) {
                None => 0,
                Some(Value::Str(value)) => match parse_i64(value) {
                    Some(current) => current,
                    None => return error("ERR value is not an integer or out of range"),
                },
                Some(other) => return wrongtype(other),
            };
            let next = current + delta;
            db.entries
                .insert(args[1].clone(), Value::Str(next.to_string().into_bytes()));
            db.bump(&args[1]);
            Reply::Integer(next)
        }
        "APPEND" => {
            let entry = db
                .entries
                .entry(args[1].clone())
                .or_insert_with(|| Value::Str(Vec::new()));
            match entry {
                Value::Str(value) => {
                    value.extend_from_slice(&args[2]);
                    let len = value.len() as i64;
                    db.bump(&args[1]);
                    Reply::Integer(len)
                }
                other => wrongtype(other),
            }
        }
        "STRLEN" => match db.entries.get(args[1].as_slice()) {
            None => Reply::Integer(0),
            Some(Value::Str(value)) => Reply::Integer(value.len() as i64),
            Some(other) => wrongtype(other),
        },
        "LPUSH" | "RPUSH" => {
            let entry = db
                .entries
                .entry(args[1].clone())
                .or_insert_with(|| Value::List(VecDeque::new()));
            match entry {
                Value::List(list) => {
                    for value in &args[2..] {
                        if name == "LPUSH" {
                            list.push_front(value.clone());
                        } else {
                            list.push_back(value.clone());
                        }
                    }
                    let len = list.len() as i64;
                    db.bump(&args[1]);
                    Reply::Integer(len)
                }
                other => wrongtype(other),
            }
        }
        "LPOP" | "RPOP" => match db.entries.get_mut(args[1].as_slice()) {
            None => Reply::Bulk(None),
            Some(Value::List(list)) => {
                let value = if name == "LPOP" {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                match value {
                    Some(value) => {
                        db.bump(&args[1]);
                        bulk(&value)
                    }
                    None => Reply::Bulk(None),
                }
            }
            Some(other) => wrongtype(other),
        },
        "LRANGE" => {
            let (Some(start), Some(stop)) = (parse_i64(&args[2]), parse_i64(&args[3])) else {
                return error("ERR value is not an integer or out of range");
            };
            match db.entries.get(args[1].as_slice()) {
                None => Reply::Multi(Some(Vec::new())),
                Some(Value::List(list)) => {
                    let len = list.len() as i64;
                    let clamp = |index: i64| -> i64 {
                        let index = if index < 0 { len + index } else { index };
                        index.clamp(0, len)
                    };
                    let start = clamp(start);
                    let stop = (clamp(stop) + 1).min(len);
                    let items = if start >= stop {
                        Vec::new()
                    } else {
                        list.iter()
                            .skip(start as usize)
                            .take((stop - start) as usize)
                            .map(|value| bulk(value))
                            .collect()
                    };
                    Reply::Multi(Some(items))
                }
                Some(other) => wrongtype(other),
            }
        }
        "LLEN" => match db.entries.get(args[1].as_slice()) {
            None => Reply::Integer(0),
            Some(Value::List(list)) => Reply::Integer(list.len() as i64),
            Some(other) => wrongtype(other),
        },
        "HSET" => {
            let entry = db
                .entries
                .entry(args[1].clone())
                .or_insert_with(|| Value::Hash(HashMap::new()));
            match entry {
                Value::Hash(hash) => {
                    let created = hash.insert(args[2].clone(), args[3].clone()).is_none();
                    db.bump(&args[1]);
                    Reply::Integer(i64::from(created))
                }
                other => wrongtype(other),
            }
        }
        "HGET" => match db.entries.get(args[1].as_slice()) {
            None => Reply::Bulk(None),
            Some(Value::Hash(hash)) => match hash.get(args[2].as_slice()) {
                Some(value) => bulk(value),
                None => Reply::Bulk(None),
            },
            Some(other) => wrongtype(other),
        },
        "HDEL" => match db.entries.get_mut(args[1].as_slice()) {
            None => Reply::Integer(0),
            Some(Value::Hash(hash)) => {
                let mut removed = 0;
                for field in &args[2..] {
                    if hash.remove(field.as_slice()).is_some() {
                        removed += 1;
                    }
                }
                db.bump(&args[1]);
                Reply::Integer(removed)
            }
            Some(other) => wrongtype(other),
        },
        "HGETALL" => match db.entries.get(args[1].as_slice()) {
            None => Reply::Multi(Some(Vec::new())),
            Some(Value::Hash(hash)) => {
                let mut flat = Vec::with_capacity(hash.len() * 2);
                for (field, value) in hash {
                    flat.push(bulk(field));
                    flat.push(bulk(value));
                }
                Reply::Multi(Some(flat))
            }
            Some(other) => wrongtype(other),
        },
        "FLUSHDB" => {
            let keys: Vec<Vec<u8>> = db.entries.keys().cloned().collect();
            db.entries.clear();
            for key in keys {
                db.bump(&key);
            }
            simple("OK")
        }
        "DBSIZE" => Reply::Integer(db.entries.len() as i64),
        _ => error("ERR unknown command"),
    }
}

fn simple(text: &str) -> Reply {
    Reply::Simple(text.as_bytes().to_vec())
}

fn error(text: &str) -> Reply {
    Reply::Error(text.to_owned())
}

fn bulk(bytes: &[u8]) -> Reply {
    Reply::Bulk(Some(bytes.to_vec()))
}

fn wrongtype(value: &Value) -> Reply {
    error(&format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value ({})",
        value.type_name()
    ))
}

fn ack(kind: &str, name: Option<&[u8]>, total: i64) -> Reply {
    Reply::Multi(Some(vec![
        bulk(kind.as_bytes()),
        match name {
            Some(name) => bulk(name),
            None => Reply::Bulk(None),
        },
        Reply::Integer(total),
    ]))
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Glob matching with `*` and `?`, the subset pattern subscriptions and
/// KEYS need.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((b'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((&literal, rest)) => text
            .split_first()
            .is_some_and(|(&head, tail)| head == literal && glob_match(rest, tail)),
    }
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn glob_basics() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"news.*", b"news.sports"));
        assert!(!glob_match(b"news.*", b"weather.sports"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(!glob_match(b"h?llo", b"heello"));
        assert!(glob_match(b"exact", b"exact"));
    }
}
