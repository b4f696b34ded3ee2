//! One TCP connection: buffered reads, immediate writes.
//!
//! The transport owns the two halves of a socket. Reads accumulate into a
//! byte buffer that the pure decoder scans for one complete reply at a
//! time, so a reply is either returned whole or not at all. Writes go out
//! immediately — pipelining depends on every enqueued command hitting the
//! socket at submission time.
//!
//! The transport is not thread-safe. Exclusive use is arranged above it:
//! the pool leases a connection to one task at a time, and the
//! subscription machine takes the halves apart to give the reader its own
//! task ([`Transport::into_halves`]).

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::cmd::Command;
use crate::codec::{self, Reply};
use crate::config::ConnectionInfo;
use crate::error::Error;

const READ_CHUNK: usize = 4096;

/// The receive half: socket + accumulation buffer + framing limits.
pub(crate) struct WireReader {
    half: OwnedReadHalf,
    buf: BytesMut,
    max_reply_len: usize,
    read_timeout: Option<Duration>,
}

impl WireReader {
    /// Read exactly one reply, blocking until it is complete.
    pub(crate) async fn read_one(&mut self) -> Result<Reply, Error> {
        loop {
            if let Some((reply, used)) = codec::decode(&self.buf, self.max_reply_len)? {
                self.buf.advance(used);
                trace!(kind = reply.kind_name(), "reply decoded");
                return Ok(reply);
            }
            self.buf.reserve(READ_CHUNK);
            let read = self.half.read_buf(&mut self.buf);
            let n = match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, read)
                    .await
                    .map_err(|_| Error::lost("read timed out"))?,
                None => read.await,
            }
            .map_err(|e| Error::lost_io("read failed", e))?;
            if n == 0 {
                return Err(Error::lost("server closed the connection"));
            }
        }
    }

    /// Subscription readers park on the socket indefinitely between push
    /// frames, so the per-reply timeout does not apply to them.
    pub(crate) fn clear_read_timeout(&mut self) {
        self.read_timeout = None;
    }
}

/// The transmit half.
pub(crate) struct WireWriter {
    half: OwnedWriteHalf,
}

impl WireWriter {
    /// Encode and write one command in full.
    pub(crate) async fn send(&mut self, cmd: &Command) -> Result<(), Error> {
        let wire = codec::encode_command(cmd);
        self.half
            .write_all(&wire)
            .await
            .map_err(|e| Error::lost_io("write failed", e))
    }

    /// Half-close the socket, waking any blocked reader on the other side.
    /// Best effort: a failure here means the peer is already gone.
    pub(crate) async fn shutdown(&mut self) {
        if let Err(err) = self.half.shutdown().await {
            debug!(%err, "socket shutdown failed");
        }
    }
}

/// One open connection to a server.
pub(crate) struct Transport {
    reader: WireReader,
    writer: WireWriter,
}

impl Transport {
    /// Open a TCP connection per `info`. Authentication and database
    /// selection happen a layer up; this is the raw socket.
    pub(crate) async fn connect(info: &ConnectionInfo) -> Result<Self, Error> {
        let stream = TcpStream::connect((info.endpoint.host.as_str(), info.endpoint.port))
            .await
            .map_err(|e| Error::lost_io(format!("connect to {} failed", info.endpoint), e))?;
        // Command/reply turnarounds are latency-bound, never throughput-bound.
        stream
            .set_nodelay(true)
            .map_err(|e| Error::lost_io("set_nodelay failed", e))?;
        debug!(endpoint = %info.endpoint, "connected");
        let (read, write) = stream.into_split();
        Ok(Transport {
            reader: WireReader {
                half: read,
                buf: BytesMut::with_capacity(READ_CHUNK),
                max_reply_len: info.max_reply_len,
                read_timeout: info.read_timeout,
            },
            writer: WireWriter { half: write },
        })
    }

    /// Send one command and read exactly one reply.
    pub(crate) async fn execute(&mut self, cmd: &Command) -> Result<Reply, Error> {
        self.writer.send(cmd).await?;
        self.reader.read_one().await
    }

    /// Send without reading; the pipeline and subscription paths collect
    /// replies separately.
    pub(crate) async fn send_only(&mut self, cmd: &Command) -> Result<(), Error> {
        self.writer.send(cmd).await
    }

    /// Read one reply without sending anything.
    pub(crate) async fn read_one(&mut self) -> Result<Reply, Error> {
        self.reader.read_one().await
    }

    /// Best-effort close. Dropping the halves releases the socket either
    /// way; the explicit shutdown exists to wake a peer blocked on us.
    pub(crate) async fn close(&mut self) {
        self.writer.shutdown().await;
    }

    /// Surrender both halves to the subscription machine.
    pub(crate) fn into_halves(mut self) -> (WireReader, WireWriter) {
        self.reader.clear_read_timeout();
        (self.reader, self.writer)
    }
}
