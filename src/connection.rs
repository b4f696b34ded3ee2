//! The connection core: one server connection and its mode state machine.
//!
//! A [`Connection`] moves between five modes — `Normal`, `Pipeline`,
//! `Transaction`, `Pipeline+Transaction` and `Subscribed` — plus the
//! terminal `Closed`. Every operation on the surface funnels through
//! [`Connection::dispatch`], which routes by mode:
//!
//! * `Normal`: write the command, read one reply, convert it.
//! * pipelined (externally via [`open_pipeline`](Connection::open_pipeline),
//!   or implicitly inside a transaction): write the command immediately,
//!   record a pending slot, and hand back the typed `queued()` sentinel.
//!   Real results arrive in order from
//!   [`close_pipeline`](Connection::close_pipeline) or
//!   [`exec`](Connection::exec).
//! * `Subscribed`: reject everything except subscription control and QUIT.
//!
//! Reply order equals submission order on the single full-duplex stream,
//! so the pending-record queue is the whole correlation story.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::cmd::Command;
use crate::codec::Reply;
use crate::config::ConnectionInfo;
use crate::convert::{unexpected, FromReply};
use crate::error::{Error, Outcome, PipelineOutcomes};
use crate::pubsub::{MessageListener, Subscription};
use crate::transport::Transport;

/// The observable mode of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain request/reply.
    Normal,
    /// Commands buffer into pipeline slots.
    Pipeline,
    /// MULTI is open; commands queue server-side.
    Transaction,
    /// An externally requested pipeline carrying an open MULTI.
    PipelineTransaction,
    /// The connection is a push channel; only subscription control works.
    Subscribed,
    /// Terminal. Every command fails with `ConnectionLost`.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    /// Occupies one position in the flushed result list.
    Slot,
    /// MULTI/DISCARD acknowledgements and per-command QUEUED acks inside a
    /// transaction: read in order, then dropped.
    Ack,
    /// The authoritative EXEC reply.
    Exec,
}

#[derive(Debug)]
struct Pending {
    kind: PendingKind,
    command: String,
}

/// One leased, single-user connection to a server.
pub struct Connection {
    info: ConnectionInfo,
    transport: Option<Transport>,
    pipelined: bool,
    in_txn: bool,
    watched: bool,
    pending: VecDeque<Pending>,
    subscription: Option<Subscription>,
    closed: bool,
}

///////////////////////////////////////////////////////////////////////////
// Construction and lifecycle
///////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Open a connection, authenticating and selecting the configured
    /// database as needed.
    pub async fn connect(info: ConnectionInfo) -> Result<Self, Error> {
        let mut transport = Transport::connect(&info).await?;
        if let Some(password) = &info.password {
            let cmd = match &info.username {
                Some(username) => Command::new("AUTH").arg(username).arg(password),
                None => Command::new("AUTH").arg(password),
            };
            expect_ok(transport.execute(&cmd).await?)?;
        }
        if info.database != 0 {
            let cmd = Command::new("SELECT").arg(info.database);
            expect_ok(transport.execute(&cmd).await?)?;
        }
        Ok(Connection {
            info,
            transport: Some(transport),
            pipelined: false,
            in_txn: false,
            watched: false,
            pending: VecDeque::new(),
            subscription: None,
            closed: false,
        })
    }

    /// The configuration this connection was opened with.
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        if self.closed {
            return Mode::Closed;
        }
        if let Some(subscription) = &self.subscription {
            return if subscription.is_alive() {
                Mode::Subscribed
            } else {
                Mode::Closed
            };
        }
        match (self.pipelined, self.in_txn) {
            (false, false) => Mode::Normal,
            (true, false) => Mode::Pipeline,
            (false, true) => Mode::Transaction,
            (true, true) => Mode::PipelineTransaction,
        }
    }

    /// False once the connection has closed (or been poisoned by a fatal
    /// error).
    pub fn is_open(&self) -> bool {
        !matches!(self.mode(), Mode::Closed)
    }

    /// Close the connection. Idempotent; a subscribed connection is
    /// hard-cancelled by shutting the socket down under its reader.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pipelined = false;
        self.in_txn = false;
        self.watched = false;
        self.pending.clear();
        if let Some(subscription) = self.subscription.take() {
            subscription.shutdown().await;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }

    /// Whether this connection may go back to an idle pool stack: normal
    /// mode, nothing watched, not closed, no subscription.
    pub(crate) fn is_poolable(&self) -> bool {
        matches!(self.mode(), Mode::Normal) && !self.watched
    }
}

///////////////////////////////////////////////////////////////////////////
// Dispatch
///////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Send one command per the current mode and convert its reply.
    pub(crate) async fn dispatch<T: FromReply>(&mut self, cmd: Command) -> Result<T, Error> {
        match self.dispatch_raw(cmd).await? {
            Some(reply) => T::from_reply(reply),
            None => Ok(T::queued()),
        }
    }

    /// Mode-routed dispatch. `None` means the command was buffered and the
    /// caller holds a sentinel.
    pub(crate) async fn dispatch_raw(&mut self, cmd: Command) -> Result<Option<Reply>, Error> {
        self.guard_live()?;
        if self.buffering() {
            let kind = if self.in_txn {
                PendingKind::Ack
            } else {
                PendingKind::Slot
            };
            let command = cmd.name();
            let sent = self.transport_mut()?.send_only(&cmd).await;
            match sent {
                Ok(()) => {
                    self.pending.push_back(Pending { kind, command });
                    Ok(None)
                }
                Err(err) => Err(self.poison(err)),
            }
        } else {
            let executed = self.transport_mut()?.execute(&cmd).await;
            match executed {
                Ok(Reply::Error(message)) => Err(Error::Server(message)),
                Ok(reply) => Ok(Some(reply)),
                Err(err) => Err(self.poison(err)),
            }
        }
    }

    /// Fire-and-forget write for commands the server never answers
    /// (SHUTDOWN). Refused while replies are owed.
    pub(crate) async fn send_without_reply(&mut self, cmd: Command) -> Result<(), Error> {
        self.guard_live()?;
        if self.buffering() {
            return Err(Error::Unsupported(
                "this command cannot run inside a pipeline or transaction",
            ));
        }
        let sent = self.transport_mut()?.send_only(&cmd).await;
        match sent {
            Ok(()) => Ok(()),
            Err(err) => Err(self.poison(err)),
        }
    }

    /// Reject blocking and kill-style commands queued into a transaction,
    /// before anything touches the wire.
    pub(crate) fn forbid_in_txn(&self, reason: &'static str) -> Result<(), Error> {
        if self.in_txn {
            return Err(Error::InvalidState(reason));
        }
        Ok(())
    }

    fn guard_live(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::lost("connection is closed"));
        }
        if let Some(subscription) = &self.subscription {
            if subscription.is_alive() {
                return Err(Error::SubscribedMode);
            }
            return Err(Error::lost("connection closed when its subscription ended"));
        }
        Ok(())
    }

    fn buffering(&self) -> bool {
        self.pipelined || self.in_txn
    }

    fn transport_mut(&mut self) -> Result<&mut Transport, Error> {
        self.transport
            .as_mut()
            .ok_or_else(|| Error::lost("connection is closed"))
    }

    /// Fatal errors make the connection terminal on the spot.
    fn poison(&mut self, err: Error) -> Error {
        if err.is_fatal() {
            self.closed = true;
            self.transport = None;
            self.pending.clear();
        }
        err
    }
}

///////////////////////////////////////////////////////////////////////////
// Pipelining
///////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Start buffering commands into pipeline slots. Idempotent. Inside a
    /// transaction this keeps the MULTI context and merely marks the
    /// pipeline as externally owned.
    pub fn open_pipeline(&mut self) -> Result<(), Error> {
        self.guard_live()?;
        self.pipelined = true;
        Ok(())
    }

    /// Read every owed reply in submission order and return the ordered
    /// slot outcomes.
    ///
    /// Acknowledgements buffered by an open transaction are read and
    /// discarded here; a pipelined EXEC occupies one slot carrying its
    /// authoritative multi-bulk. If any slot failed — a server error
    /// reply, or transport loss part-way through the flush — the whole
    /// call raises [`Error::PipelinePartial`] with the complete list.
    ///
    /// Closing a pipeline that was never opened yields an empty list.
    pub async fn close_pipeline(&mut self) -> Result<Vec<Outcome>, Error> {
        self.guard_live()?;
        if !self.pipelined {
            return Ok(Vec::new());
        }
        self.pipelined = false;
        let outcomes = self.flush_pending().await;
        if outcomes.iter().any(Result::is_err) {
            return Err(Error::PipelinePartial(PipelineOutcomes(outcomes)));
        }
        Ok(outcomes)
    }

    /// Read one reply per pending record, in order. `Ack` records are
    /// dropped; everything else lands in the outcome list. On transport
    /// failure the remaining slots fill with `ConnectionLost` and the
    /// connection is poisoned.
    async fn flush_pending(&mut self) -> Vec<Outcome> {
        let records: Vec<Pending> = self.pending.drain(..).collect();
        let mut outcomes = Vec::with_capacity(records.len());
        let mut dead = false;
        for record in records {
            if dead {
                if record.kind != PendingKind::Ack {
                    outcomes.push(Err(Error::lost(format!(
                        "reply for {} never arrived",
                        record.command
                    ))));
                }
                continue;
            }
            let read = match self.transport.as_mut() {
                Some(transport) => transport.read_one().await,
                None => Err(Error::lost("connection is closed")),
            };
            match read {
                Ok(reply) => match record.kind {
                    PendingKind::Ack => {
                        trace!(command = %record.command, "discarding queued acknowledgement");
                    }
                    _ => outcomes.push(materialize(reply)),
                },
                Err(err) => {
                    warn!(command = %record.command, %err, "transport failed during pipeline flush");
                    self.closed = true;
                    self.transport = None;
                    dead = true;
                    if record.kind != PendingKind::Ack {
                        outcomes.push(Err(err));
                    }
                }
            }
        }
        outcomes
    }
}

///////////////////////////////////////////////////////////////////////////
// Transactions
///////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Open a transaction. Every command dispatched until
    /// [`exec`](Connection::exec) or [`discard`](Connection::discard)
    /// queues server-side and returns its typed sentinel. MULTI inside
    /// MULTI is a no-op.
    pub async fn multi(&mut self) -> Result<(), Error> {
        self.guard_live()?;
        if self.in_txn {
            return Ok(());
        }
        let sent = self
            .transport_mut()?
            .send_only(&Command::new("MULTI"))
            .await;
        if let Err(err) = sent {
            return Err(self.poison(err));
        }
        self.pending.push_back(Pending {
            kind: PendingKind::Ack,
            command: "MULTI".into(),
        });
        self.in_txn = true;
        Ok(())
    }

    /// Execute the open transaction and return the queued commands'
    /// outcomes in submission order.
    ///
    /// A nil multi-bulk — the WATCH-aborted case — comes back as an empty
    /// list with no error. Inside an externally opened pipeline the
    /// return value is a sentinel and the authoritative multi-bulk
    /// arrives as one [`close_pipeline`](Connection::close_pipeline) slot.
    pub async fn exec(&mut self) -> Result<Vec<Outcome>, Error> {
        self.guard_live()?;
        if !self.in_txn {
            return Err(Error::InvalidState("EXEC without an open MULTI"));
        }
        let sent = self.transport_mut()?.send_only(&Command::new("EXEC")).await;
        if let Err(err) = sent {
            return Err(self.poison(err));
        }
        self.pending.push_back(Pending {
            kind: PendingKind::Exec,
            command: "EXEC".into(),
        });
        self.in_txn = false;
        self.watched = false;
        if self.pipelined {
            return Ok(Vec::new());
        }
        let mut outcomes = self.flush_pending().await;
        let exec = outcomes
            .pop()
            .ok_or_else(|| Error::Protocol("EXEC produced no reply".into()))?;
        match exec? {
            Reply::Multi(None) => Ok(Vec::new()),
            Reply::Multi(Some(items)) => Ok(items.into_iter().map(materialize).collect()),
            other => Err(unexpected(&other, "multi-bulk")),
        }
    }

    /// Abandon the open transaction, dropping everything it queued. Also
    /// drains the implicit pipeline when pipelining was not externally
    /// requested.
    pub async fn discard(&mut self) -> Result<(), Error> {
        self.guard_live()?;
        if !self.in_txn {
            return Err(Error::InvalidState("DISCARD without an open MULTI"));
        }
        let sent = self
            .transport_mut()?
            .send_only(&Command::new("DISCARD"))
            .await;
        if let Err(err) = sent {
            return Err(self.poison(err));
        }
        self.pending.push_back(Pending {
            kind: PendingKind::Ack,
            command: "DISCARD".into(),
        });
        self.in_txn = false;
        self.watched = false;
        if !self.pipelined {
            let _ = self.flush_pending().await;
            if self.closed {
                return Err(Error::lost("connection lost while discarding the transaction"));
            }
        }
        Ok(())
    }

    /// Mark keys for optimistic concurrency: a later EXEC aborts if any of
    /// them changed in between. Only legal before MULTI.
    pub async fn watch(&mut self, keys: &[impl AsRef<[u8]>]) -> Result<(), Error> {
        if self.in_txn {
            return Err(Error::InvalidState("WATCH inside MULTI"));
        }
        if keys.is_empty() {
            return Err(Error::InvalidState("WATCH requires at least one key"));
        }
        let _: () = self.dispatch(Command::new("WATCH").args(keys)).await?;
        self.watched = true;
        Ok(())
    }

    /// Drop every watch on this connection.
    pub async fn unwatch(&mut self) -> Result<(), Error> {
        let _: () = self.dispatch(Command::new("UNWATCH")).await?;
        self.watched = false;
        Ok(())
    }
}

///////////////////////////////////////////////////////////////////////////
// Subscribed mode
///////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Enter subscribed mode, listening on `channels`. The connection
    /// stops accepting normal commands; further control goes through
    /// [`subscription`](Connection::subscription). When the subscription
    /// ends the connection is closed for good — buffered push frames make
    /// the wire unreusable.
    pub async fn subscribe_with<L: MessageListener>(
        &mut self,
        listener: L,
        channels: &[impl AsRef<[u8]>],
    ) -> Result<(), Error> {
        self.enter_subscribed(Box::new(listener), false, channels).await
    }

    /// Enter subscribed mode, listening on glob `patterns`.
    pub async fn psubscribe_with<L: MessageListener>(
        &mut self,
        listener: L,
        patterns: &[impl AsRef<[u8]>],
    ) -> Result<(), Error> {
        self.enter_subscribed(Box::new(listener), true, patterns).await
    }

    /// The live subscription machine, while subscribed.
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    async fn enter_subscribed(
        &mut self,
        listener: Box<dyn MessageListener>,
        patterns: bool,
        names: &[impl AsRef<[u8]>],
    ) -> Result<(), Error> {
        self.guard_live()?;
        if self.buffering() {
            return Err(Error::Unsupported(
                "SUBSCRIBE inside a pipeline or transaction",
            ));
        }
        if names.is_empty() {
            return Err(Error::InvalidState(
                "subscribing requires at least one channel or pattern",
            ));
        }
        let transport = self
            .transport
            .take()
            .ok_or_else(|| Error::lost("connection is closed"))?;
        let subscription = Subscription::start(transport, listener);
        let subscribed = if patterns {
            subscription.psubscribe(names).await
        } else {
            subscription.subscribe(names).await
        };
        if let Err(err) = subscribed {
            // the halves are already committed to the reader task
            self.closed = true;
            return Err(err);
        }
        self.subscription = Some(subscription);
        Ok(())
    }
}

fn materialize(reply: Reply) -> Outcome {
    match reply {
        Reply::Error(message) => Err(Error::Server(message)),
        reply => Ok(reply),
    }
}

fn expect_ok(reply: Reply) -> Result<(), Error> {
    match reply {
        Reply::Error(message) => Err(Error::Server(message)),
        reply if reply.is_ok() => Ok(()),
        other => Err(unexpected(&other, "status")),
    }
}
