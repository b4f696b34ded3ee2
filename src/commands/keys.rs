//! Key-space operations: existence, expiry, renaming, SORT.

use crate::cmd::{Arg, Command};
use crate::codec::Reply;
use crate::connection::Connection;
use crate::convert::{unexpected, FromReply};
use crate::error::Error;

/// Sort direction for [`Connection::sort`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Options of the SORT command. The default sorts the key's own elements
/// numerically, ascending, returning them inline.
#[derive(Debug, Clone, Default)]
pub struct SortOptions {
    /// External weight pattern (`BY`).
    pub by: Option<Vec<u8>>,
    /// Offset and count (`LIMIT`).
    pub limit: Option<(i64, i64)>,
    /// Patterns of values to fetch instead of the elements (`GET`).
    pub get: Vec<Vec<u8>>,
    /// Sort direction.
    pub order: SortOrder,
    /// Lexicographic instead of numeric comparison (`ALPHA`).
    pub alpha: bool,
    /// Store the result at this key instead of returning it (`STORE`).
    pub store: Option<Vec<u8>>,
}

/// SORT answers by shape: a count when storing, the rows otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum SortResult {
    /// Length of the stored result list (the STORE form).
    Stored(i64),
    /// The sorted elements (the inline form).
    Values(Vec<Vec<u8>>),
}

impl FromReply for SortResult {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Integer(count) => Ok(SortResult::Stored(count)),
            multi @ Reply::Multi(_) => Vec::<Vec<u8>>::from_reply(multi).map(SortResult::Values),
            other => Err(unexpected(&other, "integer or multi-bulk")),
        }
    }

    fn queued() -> Self {
        SortResult::Values(Vec::new())
    }
}

impl Connection {
    /// Delete keys, returning how many existed.
    pub async fn del(&mut self, keys: &[impl AsRef<[u8]>]) -> Result<i64, Error> {
        self.dispatch(Command::new("DEL").args(keys)).await
    }

    /// Existence test for one key.
    pub async fn exists(&mut self, key: impl Into<Arg>) -> Result<bool, Error> {
        self.dispatch(Command::new("EXISTS").arg(key)).await
    }

    /// Keys matching a glob pattern. Expensive on large key spaces; meant
    /// for diagnostics.
    pub async fn keys(&mut self, pattern: impl Into<Arg>) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("KEYS").arg(pattern)).await
    }

    /// The type name stored at `key` (`string`, `list`, `none`, ...).
    pub async fn key_type(&mut self, key: impl Into<Arg>) -> Result<String, Error> {
        self.dispatch(Command::new("TYPE").arg(key)).await
    }

    /// Rename a key, clobbering any existing target.
    pub async fn rename(
        &mut self,
        key: impl Into<Arg>,
        new_key: impl Into<Arg>,
    ) -> Result<(), Error> {
        self.dispatch(Command::new("RENAME").arg(key).arg(new_key)).await
    }

    /// Rename only when the target does not exist; true when renamed.
    pub async fn rename_nx(
        &mut self,
        key: impl Into<Arg>,
        new_key: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("RENAMENX").arg(key).arg(new_key)).await
    }

    /// Expire `key` after `seconds`; true when a timer was set.
    pub async fn expire(&mut self, key: impl Into<Arg>, seconds: i64) -> Result<bool, Error> {
        self.dispatch(Command::new("EXPIRE").arg(key).arg(seconds)).await
    }

    /// Millisecond-resolution [`expire`](Connection::expire).
    pub async fn pexpire(&mut self, key: impl Into<Arg>, millis: i64) -> Result<bool, Error> {
        self.dispatch(Command::new("PEXPIRE").arg(key).arg(millis)).await
    }

    /// Expire at a Unix timestamp in seconds.
    pub async fn expire_at(
        &mut self,
        key: impl Into<Arg>,
        unix_secs: i64,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("EXPIREAT").arg(key).arg(unix_secs)).await
    }

    /// Expire at a Unix timestamp in milliseconds.
    pub async fn pexpire_at(
        &mut self,
        key: impl Into<Arg>,
        unix_millis: i64,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("PEXPIREAT").arg(key).arg(unix_millis))
            .await
    }

    /// Remaining time-to-live in seconds; negative when absent or
    /// unexpiring.
    pub async fn ttl(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("TTL").arg(key)).await
    }

    /// Remaining time-to-live in milliseconds.
    pub async fn pttl(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("PTTL").arg(key)).await
    }

    /// Remove the expiry; true when a timer existed.
    pub async fn persist(&mut self, key: impl Into<Arg>) -> Result<bool, Error> {
        self.dispatch(Command::new("PERSIST").arg(key)).await
    }

    /// A random key, or `None` on an empty database.
    pub async fn random_key(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("RANDOMKEY")).await
    }

    /// Move `key` into another database; true when moved.
    pub async fn move_key(&mut self, key: impl Into<Arg>, database: i64) -> Result<bool, Error> {
        self.dispatch(Command::new("MOVE").arg(key).arg(database)).await
    }

    /// Opaque serialized form of the value, or `None` when absent.
    pub async fn dump(&mut self, key: impl Into<Arg>) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("DUMP").arg(key)).await
    }

    /// Recreate a key from a [`dump`](Connection::dump) payload, with a
    /// time-to-live in milliseconds (0 for none).
    pub async fn restore(
        &mut self,
        key: impl Into<Arg>,
        ttl_millis: i64,
        payload: impl Into<Arg>,
    ) -> Result<(), Error> {
        self.dispatch(Command::new("RESTORE").arg(key).arg(ttl_millis).arg(payload))
            .await
    }

    /// SORT in both its shapes: with `store` set the result is
    /// [`SortResult::Stored`], otherwise [`SortResult::Values`].
    pub async fn sort(
        &mut self,
        key: impl Into<Arg>,
        options: &SortOptions,
    ) -> Result<SortResult, Error> {
        let mut cmd = Command::new("SORT").arg(key);
        if let Some(by) = &options.by {
            cmd = cmd.arg("BY").arg(by);
        }
        if let Some((offset, count)) = options.limit {
            cmd = cmd.arg("LIMIT").arg(offset).arg(count);
        }
        for pattern in &options.get {
            cmd = cmd.arg("GET").arg(pattern);
        }
        if options.order == SortOrder::Descending {
            cmd = cmd.arg("DESC");
        }
        if options.alpha {
            cmd = cmd.arg("ALPHA");
        }
        if let Some(store) = &options.store {
            cmd = cmd.arg("STORE").arg(store);
        }
        self.dispatch(cmd).await
    }
}
