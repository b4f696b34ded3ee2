//! Unordered set operations.

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

impl Connection {
    /// Add members, returning how many were actually new.
    pub async fn sadd(
        &mut self,
        key: impl Into<Arg>,
        members: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("SADD").arg(key).args(members)).await
    }

    /// Remove members, returning how many were present.
    pub async fn srem(
        &mut self,
        key: impl Into<Arg>,
        members: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("SREM").arg(key).args(members)).await
    }

    /// All members, in no particular order.
    pub async fn smembers(&mut self, key: impl Into<Arg>) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("SMEMBERS").arg(key)).await
    }

    /// Membership test.
    pub async fn sismember(
        &mut self,
        key: impl Into<Arg>,
        member: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("SISMEMBER").arg(key).arg(member)).await
    }

    /// Cardinality; 0 for a missing key.
    pub async fn scard(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("SCARD").arg(key)).await
    }

    /// Intersection of `keys`.
    pub async fn sinter(&mut self, keys: &[impl AsRef<[u8]>]) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("SINTER").args(keys)).await
    }

    /// Store the intersection of `keys` into `destination`, returning its
    /// cardinality.
    pub async fn sinterstore(
        &mut self,
        destination: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("SINTERSTORE").arg(destination).args(keys))
            .await
    }

    /// Union of `keys`.
    pub async fn sunion(&mut self, keys: &[impl AsRef<[u8]>]) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("SUNION").args(keys)).await
    }

    /// Store the union of `keys` into `destination`.
    pub async fn sunionstore(
        &mut self,
        destination: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("SUNIONSTORE").arg(destination).args(keys))
            .await
    }

    /// Members of the first key minus every later one.
    pub async fn sdiff(&mut self, keys: &[impl AsRef<[u8]>]) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("SDIFF").args(keys)).await
    }

    /// Store the difference into `destination`.
    pub async fn sdiffstore(
        &mut self,
        destination: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("SDIFFSTORE").arg(destination).args(keys))
            .await
    }

    /// Remove and return a random member.
    pub async fn spop(&mut self, key: impl Into<Arg>) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("SPOP").arg(key)).await
    }

    /// A random member, without removing it.
    pub async fn srandmember(&mut self, key: impl Into<Arg>) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("SRANDMEMBER").arg(key)).await
    }

    /// Up to `count` random members (negative counts allow repeats).
    pub async fn srandmember_count(
        &mut self,
        key: impl Into<Arg>,
        count: i64,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("SRANDMEMBER").arg(key).arg(count)).await
    }

    /// Move `member` between sets; true when it was moved.
    pub async fn smove(
        &mut self,
        source: impl Into<Arg>,
        destination: impl Into<Arg>,
        member: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(
            Command::new("SMOVE")
                .arg(source)
                .arg(destination)
                .arg(member),
        )
        .await
    }
}
