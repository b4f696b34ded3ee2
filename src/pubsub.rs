//! The subscription machine.
//!
//! Entering subscribed mode takes the transport apart: the read half moves
//! into a dedicated reader task that blocks on the socket and routes push
//! frames, while the write half goes behind a mutex shared by the control
//! methods. The reader holds no lock during its blocking read, so
//! subscribe/unsubscribe control never waits on server silence.
//!
//! The reader also owns the subscription bookkeeping: acknowledgement
//! frames — not the control callers — update the channel and pattern sets,
//! and when the server reports zero remaining subscriptions the loop shuts
//! the socket down and exits. The connection that entered subscribed mode
//! is closed for good at that point; the wire may still hold buffered push
//! frames, so it never returns to a pool.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cmd::Command;
use crate::codec::Reply;
use crate::error::Error;
use crate::transport::{Transport, WireReader, WireWriter};

/// One pushed message, raw bytes throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The matching pattern, for pattern subscriptions.
    pub pattern: Option<Vec<u8>>,
    /// The channel the message was published to.
    pub channel: Vec<u8>,
    /// The published payload.
    pub payload: Vec<u8>,
}

/// Receives pushed messages on the subscription's reader task. Keep
/// `on_message` quick — it runs inline with frame routing.
pub trait MessageListener: Send + Sync + 'static {
    /// Called once per `message`/`pmessage` push frame.
    fn on_message(&self, message: Message);
}

impl<F> MessageListener for F
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: Message) {
        self(message)
    }
}

struct SubShared {
    channels: StdMutex<HashSet<Vec<u8>>>,
    patterns: StdMutex<HashSet<Vec<u8>>>,
    alive: AtomicBool,
}

/// The live state of a connection in subscribed mode.
pub struct Subscription {
    writer: Arc<Mutex<WireWriter>>,
    shared: Arc<SubShared>,
    reader: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn start(transport: Transport, listener: Box<dyn MessageListener>) -> Self {
        let (reader, writer) = transport.into_halves();
        let writer = Arc::new(Mutex::new(writer));
        let shared = Arc::new(SubShared {
            channels: StdMutex::new(HashSet::new()),
            patterns: StdMutex::new(HashSet::new()),
            alive: AtomicBool::new(true),
        });
        let task = tokio::spawn(reader_loop(
            reader,
            Arc::clone(&writer),
            Arc::clone(&shared),
            listener,
        ));
        Subscription {
            writer,
            shared,
            reader: task,
        }
    }

    /// Subscribe to more channels. Additive; the acknowledgement frames
    /// update [`channels`](Subscription::channels).
    pub async fn subscribe(&self, channels: &[impl AsRef<[u8]>]) -> Result<(), Error> {
        self.send_control("SUBSCRIBE", channels).await
    }

    /// Subscribe to more glob patterns.
    pub async fn psubscribe(&self, patterns: &[impl AsRef<[u8]>]) -> Result<(), Error> {
        self.send_control("PSUBSCRIBE", patterns).await
    }

    /// Unsubscribe from the given channels; an empty slice means all of
    /// them.
    pub async fn unsubscribe(&self, channels: &[impl AsRef<[u8]>]) -> Result<(), Error> {
        self.send_control("UNSUBSCRIBE", channels).await
    }

    /// Unsubscribe from the given patterns; an empty slice means all of
    /// them.
    pub async fn punsubscribe(&self, patterns: &[impl AsRef<[u8]>]) -> Result<(), Error> {
        self.send_control("PUNSUBSCRIBE", patterns).await
    }

    /// False once the last channel and pattern are gone or the connection
    /// died.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Channels currently subscribed, per server acknowledgement.
    pub fn channels(&self) -> Vec<Vec<u8>> {
        self.shared.channels.lock().unwrap().iter().cloned().collect()
    }

    /// Patterns currently subscribed, per server acknowledgement.
    pub fn patterns(&self) -> Vec<Vec<u8>> {
        self.shared.patterns.lock().unwrap().iter().cloned().collect()
    }

    /// Hard cancellation: shut the socket down under the blocked reader
    /// and stop the task.
    pub(crate) async fn shutdown(&self) {
        self.shared.alive.store(false, Ordering::Release);
        self.writer.lock().await.shutdown().await;
        self.reader.abort();
    }

    async fn send_control(&self, name: &str, names: &[impl AsRef<[u8]>]) -> Result<(), Error> {
        if !self.is_alive() {
            return Err(Error::lost("subscription has ended"));
        }
        let cmd = Command::new(name).args(names);
        let mut writer = self.writer.lock().await;
        writer.send(&cmd).await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // detached reader tasks would pin the socket forever
        self.reader.abort();
    }
}

enum Routed {
    Continue,
    Finished,
}

async fn reader_loop(
    mut reader: WireReader,
    writer: Arc<Mutex<WireWriter>>,
    shared: Arc<SubShared>,
    listener: Box<dyn MessageListener>,
) {
    loop {
        let frame = match reader.read_one().await {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "subscription reader stopping");
                break;
            }
        };
        match route(frame, &shared, listener.as_ref()) {
            Ok(Routed::Continue) => {}
            Ok(Routed::Finished) => {
                debug!("last subscription removed, reader exiting");
                break;
            }
            Err(err) => {
                warn!(%err, "malformed push frame, terminating subscription");
                break;
            }
        }
    }
    shared.alive.store(false, Ordering::Release);
    writer.lock().await.shutdown().await;
}

fn route(frame: Reply, shared: &SubShared, listener: &dyn MessageListener) -> Result<Routed, Error> {
    let items = match frame {
        Reply::Multi(Some(items)) => items,
        other => {
            return Err(Error::Protocol(format!(
                "push frame is a {}, expected a multi-bulk",
                other.kind_name()
            )))
        }
    };
    let mut items = items.into_iter();
    let kind_field = items
        .next()
        .and_then(bulk)
        .ok_or_else(|| Error::Protocol("push frame without a kind field".into()))?;
    let kind = String::from_utf8_lossy(&kind_field);
    match kind.as_ref() {
        "message" => {
            let channel = take_bulk(&mut items, "message channel")?;
            let payload = take_bulk(&mut items, "message payload")?;
            trace!(channel = %String::from_utf8_lossy(&channel), "routing message");
            listener.on_message(Message {
                pattern: None,
                channel,
                payload,
            });
            Ok(Routed::Continue)
        }
        "pmessage" => {
            let pattern = take_bulk(&mut items, "pmessage pattern")?;
            let channel = take_bulk(&mut items, "pmessage channel")?;
            let payload = take_bulk(&mut items, "pmessage payload")?;
            listener.on_message(Message {
                pattern: Some(pattern),
                channel,
                payload,
            });
            Ok(Routed::Continue)
        }
        "subscribe" | "psubscribe" => {
            let name = take_bulk(&mut items, "subscribe acknowledgement name")?;
            let _count = take_count(&mut items)?;
            let set = if kind == "subscribe" {
                &shared.channels
            } else {
                &shared.patterns
            };
            set.lock().unwrap().insert(name);
            Ok(Routed::Continue)
        }
        "unsubscribe" | "punsubscribe" => {
            // the name is nil when nothing was subscribed to begin with
            let name = items.next().and_then(bulk);
            let count = take_count(&mut items)?;
            let set = if kind == "unsubscribe" {
                &shared.channels
            } else {
                &shared.patterns
            };
            if let Some(name) = name {
                set.lock().unwrap().remove(&name);
            }
            if count == 0 {
                Ok(Routed::Finished)
            } else {
                Ok(Routed::Continue)
            }
        }
        other => Err(Error::Protocol(format!("unknown push frame kind {other:?}"))),
    }
}

fn bulk(reply: Reply) -> Option<Vec<u8>> {
    match reply {
        Reply::Bulk(Some(bytes)) => Some(bytes),
        Reply::Simple(bytes) => Some(bytes),
        _ => None,
    }
}

fn take_bulk(
    items: &mut std::vec::IntoIter<Reply>,
    what: &str,
) -> Result<Vec<u8>, Error> {
    items
        .next()
        .and_then(bulk)
        .ok_or_else(|| Error::Protocol(format!("push frame is missing its {what}")))
}

fn take_count(items: &mut std::vec::IntoIter<Reply>) -> Result<i64, Error> {
    match items.next() {
        Some(Reply::Integer(count)) => Ok(count),
        other => Err(Error::Protocol(format!(
            "push frame count is {}, expected an integer",
            other.map_or("missing", |r| r.kind_name())
        ))),
    }
}
