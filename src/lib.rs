//! # respline
//!
//! A connection core for RESP data-structure servers, built around three
//! execution modes sharing one full-duplex TCP stream:
//!
//! 1. **Request/reply** — [`Connection`] sends a command and blocks for
//!    its reply, with typed conversion per operation.
//! 2. **Pipelining** — [`Connection::open_pipeline`] switches dispatch to
//!    write-immediately/collect-later; [`Connection::close_pipeline`]
//!    reads every owed reply in submission order.
//! 3. **Transactions** — [`Connection::multi`] /
//!    [`Connection::exec`] / [`Connection::discard`] with
//!    [`Connection::watch`] for optimistic concurrency, composing with
//!    pipelining.
//!
//! A fourth, exclusive mode turns a connection into a push channel:
//! [`Connection::subscribe_with`] hands the socket to a background reader
//! that routes published messages to a [`MessageListener`].
//!
//! Connections are single-user by design; the [`Pool`] is the one place
//! that hands them out, and its lease/return discipline is what makes
//! concurrent use safe. Every failure surfaces as exactly one variant of
//! [`Error`].
//!
//! ```no_run
//! use respline::{Connection, ConnectionInfo, Endpoint};
//!
//! # async fn demo() -> Result<(), respline::Error> {
//! let info = ConnectionInfo::new(Endpoint::new("127.0.0.1", 6379));
//! let mut conn = Connection::connect(info).await?;
//! conn.set("greeting", "hello").await?;
//! assert_eq!(conn.get("greeting").await?, Some(b"hello".to_vec()));
//! # Ok(())
//! # }
//! ```

mod cmd;
mod codec;
mod commands;
mod config;
mod connection;
mod convert;
mod counter;
mod error;
mod pool;
mod pubsub;
mod transport;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use cmd::{Arg, Command};
pub use codec::{decode, encode_command, encode_reply, Reply};
pub use commands::{BitOp, InsertPosition, SortOptions, SortOrder, SortResult};
pub use config::{ConnectionInfo, Endpoint, InvalidEndpoint, DEFAULT_MAX_REPLY_LEN};
pub use connection::{Connection, Mode};
pub use convert::FromReply;
pub use counter::AtomicCounter;
pub use error::{Error, Outcome, PipelineOutcomes};
pub use pool::{Pool, PoolConfig, PooledConnection};
pub use pubsub::{Message, MessageListener, Subscription};
