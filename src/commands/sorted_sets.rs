//! Sorted set operations. Scores are 64-bit floats; open-ended ranges use
//! the infinities, which encode as `+inf`/`-inf` on the wire.

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

impl Connection {
    /// Add one member with its score; true when the member was new.
    pub async fn zadd(
        &mut self,
        key: impl Into<Arg>,
        score: f64,
        member: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("ZADD").arg(key).arg(score).arg(member))
            .await
    }

    /// Add many score/member pairs, returning how many were new.
    pub async fn zadd_multi(
        &mut self,
        key: impl Into<Arg>,
        entries: &[(f64, impl AsRef<[u8]>)],
    ) -> Result<i64, Error> {
        let mut cmd = Command::new("ZADD").arg(key);
        for (score, member) in entries {
            cmd = cmd.arg(*score).arg(member.as_ref());
        }
        self.dispatch(cmd).await
    }

    /// Remove members, returning how many were present.
    pub async fn zrem(
        &mut self,
        key: impl Into<Arg>,
        members: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("ZREM").arg(key).args(members)).await
    }

    /// Members between inclusive rank positions, ascending by score.
    pub async fn zrange(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("ZRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    /// [`zrange`](Connection::zrange) with each member's score.
    pub async fn zrange_with_scores(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, Error> {
        self.dispatch(
            Command::new("ZRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// Members between inclusive rank positions, descending by score.
    pub async fn zrevrange(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("ZREVRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    /// [`zrevrange`](Connection::zrevrange) with scores.
    pub async fn zrevrange_with_scores(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Vec<u8>, f64)>, Error> {
        self.dispatch(
            Command::new("ZREVRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// Members whose scores fall in the inclusive `[min, max]` range,
    /// ascending.
    pub async fn zrange_by_score(
        &mut self,
        key: impl Into<Arg>,
        min: f64,
        max: f64,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("ZRANGEBYSCORE").arg(key).arg(min).arg(max))
            .await
    }

    /// [`zrange_by_score`](Connection::zrange_by_score) with scores.
    pub async fn zrange_by_score_with_scores(
        &mut self,
        key: impl Into<Arg>,
        min: f64,
        max: f64,
    ) -> Result<Vec<(Vec<u8>, f64)>, Error> {
        self.dispatch(
            Command::new("ZRANGEBYSCORE")
                .arg(key)
                .arg(min)
                .arg(max)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// Score-range scan, descending; note the argument order is
    /// `max` then `min`, mirroring the wire command.
    pub async fn zrevrange_by_score(
        &mut self,
        key: impl Into<Arg>,
        max: f64,
        min: f64,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("ZREVRANGEBYSCORE").arg(key).arg(max).arg(min))
            .await
    }

    /// [`zrevrange_by_score`](Connection::zrevrange_by_score) with scores.
    pub async fn zrevrange_by_score_with_scores(
        &mut self,
        key: impl Into<Arg>,
        max: f64,
        min: f64,
    ) -> Result<Vec<(Vec<u8>, f64)>, Error> {
        self.dispatch(
            Command::new("ZREVRANGEBYSCORE")
                .arg(key)
                .arg(max)
                .arg(min)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// Cardinality; 0 for a missing key.
    pub async fn zcard(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("ZCARD").arg(key)).await
    }

    /// Count of members with scores in the inclusive `[min, max]` range.
    pub async fn zcount(
        &mut self,
        key: impl Into<Arg>,
        min: f64,
        max: f64,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("ZCOUNT").arg(key).arg(min).arg(max)).await
    }

    /// Score of `member`, or `None` when absent.
    pub async fn zscore(
        &mut self,
        key: impl Into<Arg>,
        member: impl Into<Arg>,
    ) -> Result<Option<f64>, Error> {
        self.dispatch(Command::new("ZSCORE").arg(key).arg(member)).await
    }

    /// Ascending rank of `member`, or `None` when absent.
    pub async fn zrank(
        &mut self,
        key: impl Into<Arg>,
        member: impl Into<Arg>,
    ) -> Result<Option<i64>, Error> {
        self.dispatch(Command::new("ZRANK").arg(key).arg(member)).await
    }

    /// Descending rank of `member`, or `None` when absent.
    pub async fn zrevrank(
        &mut self,
        key: impl Into<Arg>,
        member: impl Into<Arg>,
    ) -> Result<Option<i64>, Error> {
        self.dispatch(Command::new("ZREVRANK").arg(key).arg(member)).await
    }

    /// Add `delta` to the member's score, returning the new score.
    pub async fn zincr_by(
        &mut self,
        key: impl Into<Arg>,
        delta: f64,
        member: impl Into<Arg>,
    ) -> Result<f64, Error> {
        self.dispatch(Command::new("ZINCRBY").arg(key).arg(delta).arg(member))
            .await
    }

    /// Remove members between inclusive rank positions, returning how
    /// many went away.
    pub async fn zremrange_by_rank(
        &mut self,
        key: impl Into<Arg>,
        start: i64,
        stop: i64,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("ZREMRANGEBYRANK").arg(key).arg(start).arg(stop))
            .await
    }

    /// Remove members with scores in the inclusive `[min, max]` range.
    pub async fn zremrange_by_score(
        &mut self,
        key: impl Into<Arg>,
        min: f64,
        max: f64,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("ZREMRANGEBYSCORE").arg(key).arg(min).arg(max))
            .await
    }

    /// Store the intersection of sorted sets into `destination`,
    /// returning its cardinality.
    pub async fn zinterstore(
        &mut self,
        destination: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(
            Command::new("ZINTERSTORE")
                .arg(destination)
                .arg(keys.len())
                .args(keys),
        )
        .await
    }

    /// Store the union of sorted sets into `destination`.
    pub async fn zunionstore(
        &mut self,
        destination: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(
            Command::new("ZUNIONSTORE")
                .arg(destination)
                .arg(keys.len())
                .args(keys),
        )
        .await
    }
}
