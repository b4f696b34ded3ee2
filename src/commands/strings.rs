//! String (plain value) operations.

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

/// Operand of [`Connection::bitop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl BitOp {
    fn as_str(self) -> &'static str {
        match self {
            BitOp::And => "AND",
            BitOp::Or => "OR",
            BitOp::Xor => "XOR",
            BitOp::Not => "NOT",
        }
    }
}

impl Connection {
    /// Value of `key`, or `None` when it does not exist. A zero-length
    /// value and a missing key are distinct outcomes.
    pub async fn get(&mut self, key: impl Into<Arg>) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("GET").arg(key)).await
    }

    /// Set `key` to `value`.
    pub async fn set(&mut self, key: impl Into<Arg>, value: impl Into<Arg>) -> Result<(), Error> {
        self.dispatch(Command::new("SET").arg(key).arg(value)).await
    }

    /// Set `key` with a time-to-live in seconds.
    pub async fn set_ex(
        &mut self,
        key: impl Into<Arg>,
        seconds: u64,
        value: impl Into<Arg>,
    ) -> Result<(), Error> {
        self.dispatch(Command::new("SETEX").arg(key).arg(seconds).arg(value))
            .await
    }

    /// Set `key` only if it does not exist yet; true when the set
    /// happened.
    pub async fn set_nx(
        &mut self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("SETNX").arg(key).arg(value)).await
    }

    /// Old value of `key` while setting it to `value`.
    pub async fn get_set(
        &mut self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("GETSET").arg(key).arg(value)).await
    }

    /// Values of `keys`, position-aligned, `None` per missing key.
    pub async fn mget(
        &mut self,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<Vec<Option<Vec<u8>>>, Error> {
        self.dispatch(Command::new("MGET").args(keys)).await
    }

    /// Set every pair at once.
    pub async fn mset(
        &mut self,
        pairs: &[(impl AsRef<[u8]>, impl AsRef<[u8]>)],
    ) -> Result<(), Error> {
        let mut cmd = Command::new("MSET");
        for (key, value) in pairs {
            cmd = cmd.arg(key.as_ref()).arg(value.as_ref());
        }
        self.dispatch(cmd).await
    }

    /// Set every pair, but only if none of the keys exist; true when the
    /// set happened.
    pub async fn mset_nx(
        &mut self,
        pairs: &[(impl AsRef<[u8]>, impl AsRef<[u8]>)],
    ) -> Result<bool, Error> {
        let mut cmd = Command::new("MSETNX");
        for (key, value) in pairs {
            cmd = cmd.arg(key.as_ref()).arg(value.as_ref());
        }
        self.dispatch(cmd).await
    }

    /// Append to the value of `key`, returning the new length.
    pub async fn append(
        &mut self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("APPEND").arg(key).arg(value)).await
    }

    /// Substring of the value by inclusive byte offsets; negative offsets
    /// count from the end.
    pub async fn get_range(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        end: i64,
    ) -> Result<Vec<u8>, Error> {
        self.dispatch(Command::new("GETRANGE").arg(key).arg(start).arg(end))
            .await
    }

    /// Overwrite part of the value starting at `offset`, returning the
    /// resulting length.
    pub async fn set_range(
        &mut self,
        key: impl Into<Arg>,
        offset: i64,
        value: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("SETRANGE").arg(key).arg(offset).arg(value))
            .await
    }

    /// Length of the value in bytes; 0 for a missing key.
    pub async fn strlen(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("STRLEN").arg(key)).await
    }

    /// Increment the integer value of `key` by one, returning the result.
    pub async fn incr(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("INCR").arg(key)).await
    }

    /// Increment by `delta`.
    pub async fn incr_by(&mut self, key: impl Into<Arg>, delta: i64) -> Result<i64, Error> {
        self.dispatch(Command::new("INCRBY").arg(key).arg(delta)).await
    }

    /// Increment the float value of `key` by `delta`, returning the
    /// result.
    pub async fn incr_by_float(
        &mut self,
        key: impl Into<Arg>,
        delta: f64,
    ) -> Result<f64, Error> {
        self.dispatch(Command::new("INCRBYFLOAT").arg(key).arg(delta)).await
    }

    /// Decrement the integer value of `key` by one.
    pub async fn decr(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("DECR").arg(key)).await
    }

    /// Decrement by `delta`.
    pub async fn decr_by(&mut self, key: impl Into<Arg>, delta: i64) -> Result<i64, Error> {
        self.dispatch(Command::new("DECRBY").arg(key).arg(delta)).await
    }

    /// Count of set bits in the whole value.
    pub async fn bitcount(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("BITCOUNT").arg(key)).await
    }

    /// Count of set bits within an inclusive byte range.
    pub async fn bitcount_range(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        end: i64,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("BITCOUNT").arg(key).arg(start).arg(end))
            .await
    }

    /// Bitwise-combine `keys` into `dest`, returning the length of the
    /// result. NOT takes exactly one source key.
    pub async fn bitop(
        &mut self,
        op: BitOp,
        dest: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("BITOP").arg(op.as_str()).arg(dest).args(keys))
            .await
    }

    /// Bit at `offset`.
    pub async fn get_bit(&mut self, key: impl Into<Arg>, offset: i64) -> Result<bool, Error> {
        self.dispatch(Command::new("GETBIT").arg(key).arg(offset)).await
    }

    /// Set the bit at `offset`, returning its previous value.
    pub async fn set_bit(
        &mut self,
        key: impl Into<Arg>,
        offset: i64,
        value: bool,
    ) -> Result<bool, Error> {
        self.dispatch(
            Command::new("SETBIT")
                .arg(key)
                .arg(offset)
                .arg(i64::from(value)),
        )
        .await
    }
}
