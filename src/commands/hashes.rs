//! Hash (field/value map) operations.

use std::collections::HashMap;

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

impl Connection {
    /// Set one field; true when the field was new.
    pub async fn hset(
        &mut self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("HSET").arg(key).arg(field).arg(value))
            .await
    }

    /// Set one field only if it does not exist yet.
    pub async fn hset_nx(
        &mut self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("HSETNX").arg(key).arg(field).arg(value))
            .await
    }

    /// Value of one field.
    pub async fn hget(
        &mut self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
    ) -> Result<Option<Vec<u8>>, Error> {
        self.dispatch(Command::new("HGET").arg(key).arg(field)).await
    }

    /// Set every field/value pair at once.
    pub async fn hmset(
        &mut self,
        key: impl Into<Arg>,
        pairs: &[(impl AsRef<[u8]>, impl AsRef<[u8]>)],
    ) -> Result<(), Error> {
        let mut cmd = Command::new("HMSET").arg(key);
        for (field, value) in pairs {
            cmd = cmd.arg(field.as_ref()).arg(value.as_ref());
        }
        self.dispatch(cmd).await
    }

    /// Values of `fields`, position-aligned, `None` per missing field.
    pub async fn hmget(
        &mut self,
        key: impl Into<Arg>,
        fields: &[impl AsRef<[u8]>],
    ) -> Result<Vec<Option<Vec<u8>>>, Error> {
        self.dispatch(Command::new("HMGET").arg(key).args(fields)).await
    }

    /// Delete fields, returning how many existed.
    pub async fn hdel(
        &mut self,
        key: impl Into<Arg>,
        fields: &[impl AsRef<[u8]>],
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("HDEL").arg(key).args(fields)).await
    }

    /// Field existence test.
    pub async fn hexists(
        &mut self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
    ) -> Result<bool, Error> {
        self.dispatch(Command::new("HEXISTS").arg(key).arg(field)).await
    }

    /// Every field name.
    pub async fn hkeys(&mut self, key: impl Into<Arg>) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("HKEYS").arg(key)).await
    }

    /// Every value.
    pub async fn hvals(&mut self, key: impl Into<Arg>) -> Result<Vec<Vec<u8>>, Error> {
        self.dispatch(Command::new("HVALS").arg(key)).await
    }

    /// The whole hash as a map.
    pub async fn hgetall(
        &mut self,
        key: impl Into<Arg>,
    ) -> Result<HashMap<Vec<u8>, Vec<u8>>, Error> {
        self.dispatch(Command::new("HGETALL").arg(key)).await
    }

    /// Number of fields; 0 for a missing key.
    pub async fn hlen(&mut self, key: impl Into<Arg>) -> Result<i64, Error> {
        self.dispatch(Command::new("HLEN").arg(key)).await
    }

    /// Increment an integer field by `delta`, returning the result.
    pub async fn hincr_by(
        &mut self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
        delta: i64,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("HINCRBY").arg(key).arg(field).arg(delta))
            .await
    }

    /// Increment a float field by `delta`, returning the result.
    pub async fn hincr_by_float(
        &mut self,
        key: impl Into<Arg>,
        field: impl Into<Arg>,
        delta: f64,
    ) -> Result<f64, Error> {
        self.dispatch(Command::new("HINCRBYFLOAT").arg(key).arg(field).arg(delta))
            .await
    }
}
