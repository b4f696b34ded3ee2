//! List operations, including the blocking pops.

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

/// Where [`Connection::linsert`] places the new element relative to the
/// pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

impl InsertPosition {
    fn as_str(self) -> &'static str {
        match self {
            InsertPosition::Before => "BEFORE",
            InsertPosition::After => "AFTER",
        }
    }
}

impl Connection {
    /// Push values onto the head, returning the new length.
    pub async fn lpush(
        &mut self,
        key: impl Into<Arg>,
        values: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("LPUSH").arg(key).args(values)).await
    }

    /// Push values onto the tail, returning the new length.
    pub async fn rpush(
        &mut self,
        key: impl Into<Arg>,
        values: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("RPUSH").arg(key).args(values)).await
    }

    /// Head-push only if the list already exists.
    pub async fn lpush_x(
        &mut self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("LPUSHX").arg(key).arg(value)).await
    }

    /// Tail-push only if the list already exists.
    pub async fn rpush_x(
        &mut self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("RPUSHX").arg(key).arg(value)).await
    }

    /// Pop from the head.
    pub async fn lpop(&mut self, key: impl Into<Arg>) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("LPOP").arg(key)).await
    }

    /// Pop from the tail.
    pub async fn rpop(&mut self, key: impl Into<Arg>) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("RPOP").arg(key)).await
    }

    /// Elements between inclusive indices; negative indices count from
    /// the end.
    pub async fn lrange(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    /// List length; 0 for a missing key.
    pub async fn llen(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("LLEN").arg(key)).await
    }

    /// Element at `index`.
    pub async fn lindex(
        &mut self,
        key: impl Into<Arg>,
        index: i64,
    ) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("LINDEX").arg(key).arg(index)).await
    }

    /// Insert `value` next to the first occurrence of `pivot`. Returns
    /// the new length, or -1 when the pivot was not found.
    pub async fn linsert(
        &mut self,
        key: impl Into<Arg>,
        position: InsertPosition,
        pivot: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(
            Command::new("LINSERT")
                .arg(key)
                .arg(position.as_str())
                .arg(pivot)
                .arg(value),
        )
        .await
    }

    /// Remove up to `count` occurrences of `value` (sign selects the scan
    /// direction, 0 removes all), returning how many went away.
    pub async fn lrem(
        &mut self,
        key: impl Into<Arg>,
        count: i64,
        value: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("LREM").arg(key).arg(count).arg(value))
            .await
    }

    /// Overwrite the element at `index`.
    pub async fn lset(
        &mut self,
        key: impl Into<Arg>,
        index: i64,
        value: impl Into<Arg>,
    ) -> Result<(), Error> {
        self.dispatch(Command::new("LSET").arg(key).arg(index).arg(value))
            .await
    }

    /// Trim the list to the inclusive index range.
    pub async fn ltrim(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<(), Error> {
        self.dispatch(Command::new("LTRIM").arg(key).arg(start).arg(stop))
            .await
    }

    /// Rotate the tail of `source` onto the head of `destination`.
    pub async fn rpoplpush(
        &mut self,
        source: impl Into<Arg>,
        destination: impl Into<Arg>,
    ) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("RPOPLPUSH").arg(source).arg(destination))
            .await
    }

    /// Blocking head-pop across `keys`, waiting up to `timeout_secs`
    /// (0 waits forever). `None` on timeout; otherwise the popped key and
    /// element.
    ///
    /// Blocking operations never queue into a transaction — the server
    /// would not block there, it would just return nil while holding the
    /// transaction open.
    pub async fn blpop(
        &mut self,
        keys: &[impl AsRef<[u8]>],
        timeout_secs: u64,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, Error> {
        self.forbid_in_txn("BLPOP is a blocking operation, not allowed inside MULTI")?;
        self.dispatch(Command::new("BLPOP").args(keys).arg(timeout_secs))
            .await
    }

    /// Blocking tail-pop; see [`blpop`](Connection::blpop).
    pub async fn brpop(
        &mut self,
        keys: &[impl AsRef<[u8]>],
        timeout_secs: u64,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, Error> {
        self.forbid_in_txn("BRPOP is a blocking operation, not allowed inside MULTI")?;
        self.dispatch(Command::new("BRPOP").args(keys).arg(timeout_secs))
            .await
    }

    /// Blocking [`rpoplpush`](Connection::rpoplpush); `None` on timeout.
    pub async fn brpoplpush(
        &mut self,
        source: impl Into<Arg>,
        destination: impl Into<Arg>,
        timeout_secs: u64,
    ) -> Result<Option<Vec<u8>>, Error> {
        self.forbid_in_txn("BRPOPLPUSH is a blocking operation, not allowed inside MULTI")?;
        self.dispatch(
            Command::new("BRPOPLPUSH")
                .arg(source)
                .arg(destination)
                .arg(timeout_secs),
        )
        .await
    }
}
