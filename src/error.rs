//! The error taxonomy shared by every layer of the crate.
//!
//! Everything a caller can observe going wrong — transport failure, framing
//! violations, server-reported errors, misuse of the connection state
//! machine — maps onto exactly one variant of [`Error`]. The mapping is
//! total and deterministic, and the original cause is kept attached where
//! one exists.

use std::io;

use thiserror::Error;

use crate::codec::Reply;

/// The positional result of one pipelined or transacted command: the raw
/// reply on success, a mapped error for that slot otherwise.
pub type Outcome = Result<Reply, Error>;

/// Every failure surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The TCP connection failed, reached EOF mid-conversation, or was
    /// already closed when an operation was attempted. Once raised, the
    /// originating connection is unusable.
    #[error("connection lost: {message}")]
    ConnectionLost {
        /// What the connection was doing when it died.
        message: String,
        /// The underlying I/O failure, when one exists.
        #[source]
        source: Option<io::Error>,
    },

    /// The peer violated the wire framing, or a reply exceeded the
    /// configured size cap. The originating connection is unusable.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The server answered with an error reply; the message is the
    /// server's, verbatim.
    #[error("server error: {0}")]
    Server(String),

    /// A flushed pipeline contained at least one failed slot. Carries the
    /// complete ordered outcome list, successes included, so callers can
    /// locate the failed positions.
    #[error("{0}")]
    PipelinePartial(PipelineOutcomes),

    /// A normal command was attempted while the connection was subscribed.
    /// Only subscription-control commands and QUIT are legal in that mode.
    #[error("connection is in subscriber mode")]
    SubscribedMode,

    /// The operation is meaningless in the connection's current state
    /// (WATCH inside MULTI, EXEC without MULTI, a blocking op inside
    /// MULTI, and friends).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The operation cannot be executed in the current mode at all.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// The pool could not produce a connection within its configured
    /// bounds.
    #[error("connection pool exhausted")]
    PoolExhausted,
}

impl Error {
    pub(crate) fn lost(message: impl Into<String>) -> Self {
        Error::ConnectionLost {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn lost_io(message: impl Into<String>, source: io::Error) -> Self {
        Error::ConnectionLost {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether this error poisons its connection. After a fatal error the
    /// core transitions to `Closed` and is never returned to a pool.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConnectionLost { .. } | Error::Protocol(_))
    }
}

/// The ordered per-slot outcomes carried by [`Error::PipelinePartial`].
#[derive(Debug)]
pub struct PipelineOutcomes(pub(crate) Vec<Outcome>);

impl PipelineOutcomes {
    /// Number of slots, failed and successful both.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the pipeline carried no commands.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failed slots.
    pub fn failed(&self) -> usize {
        self.0.iter().filter(|o| o.is_err()).count()
    }

    /// Borrow the ordered outcome list.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.0
    }

    /// Take ownership of the ordered outcome list.
    pub fn into_outcomes(self) -> Vec<Outcome> {
        self.0
    }
}

impl std::fmt::Display for PipelineOutcomes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} pipelined commands failed", self.failed(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_the_connection_killers() {
        assert!(Error::lost("eof").is_fatal());
        assert!(Error::Protocol("bad prefix".into()).is_fatal());
        assert!(!Error::Server("ERR nope".into()).is_fatal());
        assert!(!Error::SubscribedMode.is_fatal());
        assert!(!Error::PoolExhausted.is_fatal());
    }

    #[test]
    fn pipeline_outcomes_count_failures() {
        let outcomes = PipelineOutcomes(vec![
            Ok(Reply::Integer(1)),
            Err(Error::Server("ERR boom".into())),
            Ok(Reply::Bulk(None)),
        ]);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.failed(), 1);
        let err = Error::PipelinePartial(outcomes);
        assert_eq!(err.to_string(), "1 of 3 pipelined commands failed");
    }

    #[test]
    fn io_cause_is_preserved() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let err = Error::lost_io("write failed", io);
        let source = std::error::Error::source(&err).expect("cause kept");
        assert_eq!(source.to_string(), "pipe");
    }
}
