//! A server-backed atomic counter.
//!
//! Demonstrates the core's optimistic-concurrency contract: WATCH the key,
//! read, then MULTI/SET/EXEC. A nil EXEC reply — surfaced here as an empty
//! outcome list — is the one and only abort signal.

use crate::config::ConnectionInfo;
use crate::error::Error;
use crate::pool::Pool;

/// An `i64` counter bound to one key, with compare-and-set on top of
/// WATCH/MULTI/EXEC. A missing key reads as zero.
pub struct AtomicCounter {
    pool: Pool,
    info: ConnectionInfo,
    key: Vec<u8>,
}

impl AtomicCounter {
    /// Bind a counter to `key`, leasing connections from `pool` as
    /// needed.
    pub fn new(pool: Pool, info: ConnectionInfo, key: impl Into<Vec<u8>>) -> Self {
        AtomicCounter {
            pool,
            info,
            key: key.into(),
        }
    }

    /// Current value.
    pub async fn get(&self) -> Result<i64, Error> {
        let mut conn = self.pool.lease(&self.info).await?;
        let raw = conn.get(&self.key).await?;
        parse_value(raw)
    }

    /// Overwrite the value unconditionally.
    pub async fn set(&self, value: i64) -> Result<(), Error> {
        let mut conn = self.pool.lease(&self.info).await?;
        conn.set(&self.key, value.to_string()).await
    }

    /// Server-side atomic increment; no transaction needed.
    pub async fn increment(&self) -> Result<i64, Error> {
        let mut conn = self.pool.lease(&self.info).await?;
        conn.incr(&self.key).await
    }

    /// Set to `update` only if the current value equals `expect`.
    ///
    /// One WATCH/MULTI/EXEC round: a concurrent write to the key between
    /// WATCH and EXEC aborts the transaction and this returns `false`
    /// without retrying.
    pub async fn compare_and_set(&self, expect: i64, update: i64) -> Result<bool, Error> {
        let mut conn = self.pool.lease(&self.info).await?;
        conn.watch(&[&self.key]).await?;
        let current = parse_value(conn.get(&self.key).await?)?;
        if current != expect {
            conn.unwatch().await?;
            return Ok(false);
        }
        conn.multi().await?;
        // queued; the sentinel unit return is meaningless until EXEC
        conn.set(&self.key, update.to_string()).await?;
        let outcomes = conn.exec().await?;
        Ok(!outcomes.is_empty())
    }

    /// Atomically add `delta` and return the value from before the add,
    /// retrying the WATCH round until it lands.
    pub async fn get_and_add(&self, delta: i64) -> Result<i64, Error> {
        loop {
            let mut conn = self.pool.lease(&self.info).await?;
            conn.watch(&[&self.key]).await?;
            let current = parse_value(conn.get(&self.key).await?)?;
            conn.multi().await?;
            conn.set(&self.key, (current + delta).to_string()).await?;
            if !conn.exec().await?.is_empty() {
                return Ok(current);
            }
        }
    }

    /// [`get_and_add`](AtomicCounter::get_and_add) by one.
    pub async fn get_and_increment(&self) -> Result<i64, Error> {
        self.get_and_add(1).await
    }
}

fn parse_value(raw: Option<Vec<u8>>) -> Result<i64, Error> {
    match raw {
        None => Ok(0),
        Some(bytes) => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| Error::Protocol("counter key holds a non-integer value".into())),
    }
}
